use persona_core::{
    Document, DocumentKind, DocumentRef, DocumentStore, DropOutcome, InMemoryDocumentStore,
    OfferingStatus, PermissionLevel, PersonService, SheetError, StaticPermissionOracle,
    UnlinkOutcome, ValidationError,
};
use persona_core::{DocumentNameTables, NameTableProvider};
use serde_json::json;

fn entry(id: &str) -> DocumentRef {
    DocumentRef::new(DocumentKind::JournalEntry, id).unwrap()
}

fn actor(id: &str) -> DocumentRef {
    DocumentRef::new(DocumentKind::Actor, id).unwrap()
}

fn person(id: &str, name: &str) -> Document {
    Document::new(entry(id), name)
        .with_sheet_type("person")
        .with_body(json!({}))
}

fn world() -> InMemoryDocumentStore {
    let inn = entry("inn");
    let smith = actor("smith");
    InMemoryDocumentStore::with_documents([
        person("ada", "Ada"),
        person("bob", "Bob"),
        Document::new(inn.clone(), "The Inn").with_sheet_type("place"),
        Document::new(
            DocumentRef::embedded(&inn, DocumentKind::JournalEntryPage, "menu").unwrap(),
            "Menu",
        ),
        Document::new(entry("diary"), "Diary").with_sheet_type("text"),
        Document::new(smith.clone(), "Smith").with_img("smith.png"),
        Document::new(
            DocumentRef::embedded(&smith, DocumentKind::Item, "hammer").unwrap(),
            "Hammer",
        ),
        Document::new(DocumentRef::new(DocumentKind::Item, "loose").unwrap(), "Loose"),
    ])
}

fn owner() -> StaticPermissionOracle {
    StaticPermissionOracle::new(PermissionLevel::Owner)
}

fn drop_json(kind: &str, uuid: &str) -> String {
    json!({"type": kind, "uuid": uuid}).to_string()
}

#[test]
fn versioned_layout_is_written_back_once() {
    let store = world();
    store
        .put(&person("ada", "Ada").with_body(json!({
            "attributes": {
                "race": {"value": "Elf", "hidden": false},
                "age": {"value": "120", "hidden": true}
            }
        })))
        .unwrap();
    let service = PersonService::new(&store);
    let ada = entry("ada");

    let first = service.load(&ada).unwrap();
    assert!(first.write_back);
    let persisted = store.get(&ada).unwrap().unwrap();
    assert_eq!(persisted.body["attributes"]["race"], "Elf");
    assert_eq!(persisted.body["attributeVisibility"]["age"], false);

    let second = service.load(&ada).unwrap();
    assert!(!second.write_back);
    assert_eq!(second.record, first.record);
}

#[test]
fn sheet_lists_shown_fields_in_schema_order() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");

    service
        .submit(
            &ada,
            &json!({
                "attributes": {"age": "120", "race": "Elf", "hair": "Red"},
                "attributeVisibility": {"age": true, "race": true, "hair": false, "mood": true}
            }),
        )
        .unwrap();

    let sheet = service.sheet_data(&ada, &owner(), None).unwrap();
    let ids = sheet
        .fields
        .iter()
        .map(|field| field.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["race", "age"]);
    assert!(!sheet.record.attribute_visibility.contains_key("mood"));
    assert_eq!(sheet.has_relationships, 0);
    assert!(!sheet.has_name_tables);
}

#[test]
fn page_drop_relates_the_parent_entry() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");

    let outcome = service
        .handle_drop(
            &ada,
            &drop_json("JournalEntryPage", "JournalEntry.inn.JournalEntryPage.menu"),
            &owner(),
        )
        .unwrap();
    let DropOutcome::RelationshipAdded(relationship) = outcome else {
        panic!("expected relationship");
    };
    assert_eq!(relationship.target_ref, entry("inn"));

    let sheet = service.sheet_data(&ada, &owner(), None).unwrap();
    assert_eq!(sheet.relationships.len(), 1);
    assert_eq!(sheet.relationships[0].name, "The Inn");
    assert_eq!(sheet.relationships[0].sheet_type.as_deref(), Some("place"));
}

#[test]
fn invalid_relationship_drops_leave_record_unchanged() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");
    service
        .handle_drop(&ada, &drop_json("JournalEntry", "JournalEntry.inn"), &owner())
        .unwrap();
    let before = store.get(&ada).unwrap().unwrap();

    for (kind, uuid) in [
        ("JournalEntry", "JournalEntry.inn"),
        ("JournalEntry", "JournalEntry.ada"),
        ("JournalEntry", "JournalEntry.diary"),
        ("JournalEntry", "JournalEntry.ghost"),
        ("Item", "Item.loose"),
    ] {
        let err = service
            .handle_drop(&ada, &drop_json(kind, uuid), &owner())
            .unwrap_err();
        assert!(matches!(err, SheetError::Validation(_)), "{uuid}: {err}");
    }
    assert_eq!(store.get(&ada).unwrap().unwrap(), before);
}

#[test]
fn person_relationships_are_mirrored_and_removed_together() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");
    let bob = entry("bob");

    let DropOutcome::RelationshipAdded(relationship) = service
        .handle_drop(&ada, &drop_json("JournalEntry", "JournalEntry.bob"), &owner())
        .unwrap()
    else {
        panic!("expected relationship");
    };

    let bob_record = service.load(&bob).unwrap().record;
    assert!(bob_record.relationships.find_by_target(&ada).is_some());

    assert!(service.remove_relationship(&ada, &relationship.id).unwrap());
    assert!(service.load(&ada).unwrap().record.relationships.is_empty());
    assert!(service.load(&bob).unwrap().record.relationships.is_empty());

    assert!(!service.remove_relationship(&ada, &relationship.id).unwrap());
}

#[test]
fn hidden_and_dangling_relationships_are_filtered_for_players() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");

    service
        .handle_drop(&ada, &drop_json("JournalEntry", "JournalEntry.inn"), &owner())
        .unwrap();
    let DropOutcome::RelationshipAdded(secret) = service
        .handle_drop(&ada, &drop_json("JournalEntry", "JournalEntry.bob"), &owner())
        .unwrap()
    else {
        panic!("expected relationship");
    };
    assert_eq!(
        service.toggle_relationship_hidden(&ada, &secret.id).unwrap(),
        Some(true)
    );

    let player = StaticPermissionOracle::new(PermissionLevel::Observer);
    let sheet = service.sheet_data(&ada, &player, None).unwrap();
    assert_eq!(sheet.relationships.len(), 1);
    assert_eq!(sheet.relationships[0].target_ref, entry("inn"));

    let gm_sheet = service.sheet_data(&ada, &owner(), None).unwrap();
    assert_eq!(gm_sheet.relationships.len(), 2);

    let no_inn = StaticPermissionOracle::new(PermissionLevel::Owner)
        .with_override(entry("inn"), PermissionLevel::None);
    let sheet = service.sheet_data(&ada, &no_inn, None).unwrap();
    assert_eq!(sheet.relationships.len(), 1);
    assert_eq!(sheet.relationships[0].target_ref, entry("bob"));
}

#[test]
fn actor_drop_links_actor_and_adopts_name_and_image() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");

    let outcome = service
        .handle_drop(&ada, &drop_json("Actor", "Actor.smith"), &owner())
        .unwrap();
    assert!(matches!(outcome, DropOutcome::ActorLinked(ref linked) if linked.id == "smith"));

    let document = store.get(&ada).unwrap().unwrap();
    assert_eq!(document.name, "Smith");
    assert_eq!(document.img, "smith.png");

    let observer = StaticPermissionOracle::new(PermissionLevel::Observer);
    let sheet = service.sheet_data(&ada, &observer, None).unwrap();
    assert_eq!(sheet.actor.as_ref().map(|a| a.name.as_str()), Some("Smith"));
    assert!(sheet.can_view_actor);

    let limited = StaticPermissionOracle::new(PermissionLevel::Owner)
        .with_override(actor("smith"), PermissionLevel::Limited);
    let sheet = service.sheet_data(&ada, &limited, None).unwrap();
    assert_eq!(sheet.actor, None);
    assert!(sheet.record.actor_link.is_linked());

    assert_eq!(
        service.unlink_actor(&ada).unwrap(),
        UnlinkOutcome::RemovePortrait
    );
    assert_eq!(service.unlink_actor(&ada).unwrap(), UnlinkOutcome::NotLinked);
}

#[test]
fn deleted_actor_resolves_to_nothing() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");
    service
        .handle_drop(&ada, &drop_json("Actor", "Actor.smith"), &owner())
        .unwrap();

    let remaining = store
        .list(DocumentKind::JournalEntry)
        .unwrap()
        .into_iter()
        .chain(store.list(DocumentKind::Item).unwrap())
        .collect::<Vec<_>>();
    let pruned = InMemoryDocumentStore::with_documents(remaining);
    let service = PersonService::new(&pruned);

    let sheet = service.sheet_data(&ada, &owner(), None).unwrap();
    assert_eq!(sheet.actor, None);
}

#[test]
fn readers_cannot_drop_onto_the_sheet() {
    let store = world();
    let service = PersonService::new(&store);
    let reader = StaticPermissionOracle::new(PermissionLevel::Observer);

    let err = service
        .handle_drop(&entry("ada"), &drop_json("Actor", "Actor.smith"), &reader)
        .unwrap_err();
    assert!(matches!(err, SheetError::ReadOnly(_)));
}

#[test]
fn offering_flow_transitions_exactly_once() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");

    let DropOutcome::OfferingDraft(draft) = service
        .handle_drop(&ada, &drop_json("Item", "Actor.smith.Item.hammer"), &owner())
        .unwrap()
    else {
        panic!("expected offering draft");
    };
    assert!(service.load(&ada).unwrap().record.offerings.is_empty());

    let offering = service.propose_offering(&ada, draft).unwrap();
    assert_eq!(offering.status, OfferingStatus::Proposed);
    assert_eq!(offering.items[0].qty, 1);

    let accepted = service.accept_offering(&ada, &offering.id).unwrap().unwrap();
    assert_eq!(accepted.status, OfferingStatus::Accepted);

    let err = service.reject_offering(&ada, &offering.id).unwrap_err();
    assert!(matches!(
        err,
        SheetError::InvalidTransition {
            from: OfferingStatus::Accepted,
            ..
        }
    ));
    let stored = service.load(&ada).unwrap().record;
    assert_eq!(
        stored.offerings.get(&offering.id).unwrap().status,
        OfferingStatus::Accepted
    );

    assert_eq!(service.cancel_offering(&ada, "ghost").unwrap(), None);
    assert!(service.remove_offering(&ada, &offering.id).unwrap());
    assert!(!service.remove_offering(&ada, &offering.id).unwrap());
}

#[test]
fn empty_offering_is_rejected() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");
    let DropOutcome::OfferingDraft(mut draft) = service
        .handle_drop(&ada, &drop_json("Item", "Actor.smith.Item.hammer"), &owner())
        .unwrap()
    else {
        panic!("expected offering draft");
    };
    draft.items.clear();

    let err = service.propose_offering(&ada, draft).unwrap_err();
    assert!(matches!(
        err,
        SheetError::Validation(ValidationError::EmptyOffering)
    ));
}

#[test]
fn submit_merges_one_attribute_and_relationship_fields() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");
    service
        .submit(&ada, &json!({"attributes": {"race": "Elf", "age": "120"}}))
        .unwrap();
    let DropOutcome::RelationshipAdded(relationship) = service
        .handle_drop(&ada, &drop_json("JournalEntry", "JournalEntry.inn"), &owner())
        .unwrap()
    else {
        panic!("expected relationship");
    };

    let next = service
        .submit(
            &ada,
            &json!({
                "attributes": {"age": "121"},
                "relationships": {
                    relationship.id.clone(): {"note": "regular"},
                    "ghost": {"kind": "enemy"}
                }
            }),
        )
        .unwrap();

    assert_eq!(next.attributes["race"], "Elf");
    assert_eq!(next.attributes["age"], "121");
    assert_eq!(next.relationships.len(), 1);
    assert_eq!(next.relationships.get(&relationship.id).unwrap().note, "regular");
    assert_eq!(service.load(&ada).unwrap().record, next);
}

#[test]
fn malformed_submit_is_rejected() {
    let store = world();
    let service = PersonService::new(&store);
    let err = service
        .submit(&entry("ada"), &json!({"attributes": "not a map"}))
        .unwrap_err();
    assert!(matches!(
        err,
        SheetError::Validation(ValidationError::MalformedPayload(_))
    ));
}

#[test]
fn generated_name_is_applied_only_on_confirmation() {
    let store = world();
    store
        .put(
            &Document::new(
                DocumentRef::new(DocumentKind::RollTable, "elf-names").unwrap(),
                "Elf Name",
            )
            .with_body(json!({"results": ["Aelar"]})),
        )
        .unwrap();
    let service = PersonService::new(&store);
    let ada = entry("ada");
    service
        .submit(&ada, &json!({"attributes": {"race": "Elf"}}))
        .unwrap();

    let tables = DocumentNameTables::new(&store);
    assert!(tables.is_available());
    let generated = service.generate_name(&ada, &tables).unwrap().unwrap();
    assert_eq!(generated.full(), "Aelar");
    assert_eq!(generated.last, None);
    assert_eq!(service.load(&ada).unwrap().record.name, "Ada");

    assert!(service.apply_name(&ada, &generated.full()).unwrap());
    assert_eq!(store.get(&ada).unwrap().unwrap().name, "Aelar");

    let names: &dyn NameTableProvider = &tables;
    let sheet = service.sheet_data(&ada, &owner(), Some(names)).unwrap();
    assert!(sheet.has_name_tables);
}

#[test]
fn missing_or_foreign_documents_are_reported() {
    let store = world();
    let service = PersonService::new(&store);

    assert!(matches!(
        service.load(&entry("ghost")).unwrap_err(),
        SheetError::PersonNotFound(_)
    ));
    assert!(matches!(
        service.load(&entry("inn")).unwrap_err(),
        SheetError::NotAPerson(_)
    ));
}

#[test]
fn unrecognized_attributes_value_survives_the_version_bump() {
    let store = world();
    store
        .put(&person("ada", "Ada").with_body(json!({"attributes": "Race: Elf; Age: 120"})))
        .unwrap();
    let service = PersonService::new(&store);
    let ada = entry("ada");

    let migrated = service.load(&ada).unwrap();
    assert!(migrated.write_back);
    assert!(migrated.record.attributes.is_empty());

    let persisted = store.get(&ada).unwrap().unwrap();
    assert_eq!(persisted.body["attributes"], "Race: Elf; Age: 120");
    assert!(persisted.body["schemaVersion"].is_u64());
    assert!(!service.load(&ada).unwrap().write_back);
}

#[test]
fn undecodable_entries_are_kept_through_later_writes() {
    let store = world();
    let compendium = json!({
        "id": "r-old",
        "targetRef": "Compendium.world.npcs.JournalEntry.abc",
        "kind": "rival"
    });
    store
        .put(&person("ada", "Ada").with_body(json!({
            "relationships": [compendium.clone()],
            "offerings": [{"id": "o-old", "status": "haggling"}]
        })))
        .unwrap();
    let service = PersonService::new(&store);
    let ada = entry("ada");

    let sheet = service.sheet_data(&ada, &owner(), None).unwrap();
    assert!(sheet.relationships.is_empty());
    assert_eq!(sheet.has_offerings, 0);

    service
        .handle_drop(&ada, &drop_json("JournalEntry", "JournalEntry.inn"), &owner())
        .unwrap();
    assert!(service.apply_name(&ada, "Ada Lovelace").unwrap());

    let persisted = store.get(&ada).unwrap().unwrap();
    let relationships = persisted.body["relationships"].as_array().unwrap();
    assert_eq!(relationships.len(), 2);
    assert!(relationships.contains(&compendium));
    assert_eq!(persisted.body["offerings"][0]["id"], "o-old");
    assert_eq!(persisted.body["name"], "Ada Lovelace");
}

#[test]
fn actor_stored_as_uuid_is_resolved_and_rewritten() {
    let store = world();
    store
        .put(&person("ada", "Ada").with_body(json!({"actor": "Actor.smith"})))
        .unwrap();
    let service = PersonService::new(&store);
    let ada = entry("ada");

    let sheet = service.sheet_data(&ada, &owner(), None).unwrap();
    assert_eq!(sheet.actor.as_ref().map(|a| a.name.as_str()), Some("Smith"));

    assert!(service.apply_name(&ada, "Ada Smith").unwrap());
    let persisted = store.get(&ada).unwrap().unwrap();
    assert_eq!(persisted.body["actor"]["id"], "smith");
    assert_eq!(persisted.body["actor"]["name"], "Smith");
    assert_eq!(persisted.body["actor"]["img"], "smith.png");
}

#[test]
fn hidden_offerings_are_listed_only_for_owners() {
    let store = world();
    let service = PersonService::new(&store);
    let ada = entry("ada");
    let DropOutcome::OfferingDraft(draft) = service
        .handle_drop(&ada, &drop_json("Item", "Actor.smith.Item.hammer"), &owner())
        .unwrap()
    else {
        panic!("expected offering draft");
    };
    let offering = service.propose_offering(&ada, draft).unwrap();

    assert_eq!(
        service.toggle_offering_hidden(&ada, &offering.id).unwrap(),
        Some(true)
    );
    assert_eq!(service.toggle_offering_hidden(&ada, "ghost").unwrap(), None);

    let limited = StaticPermissionOracle::new(PermissionLevel::Limited);
    let sheet = service.sheet_data(&ada, &limited, None).unwrap();
    assert!(sheet.offerings.is_empty());
    assert_eq!(sheet.has_offerings, 0);

    let gm_sheet = service.sheet_data(&ada, &owner(), None).unwrap();
    assert_eq!(gm_sheet.offerings.len(), 1);
    assert!(gm_sheet.offerings[0].hidden);
    assert_eq!(gm_sheet.has_offerings, 1);
}
