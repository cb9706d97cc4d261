//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `persona_core` linkage without a host runtime.
//! - Print the active attribute schema in display order.

use persona_core::AttributeSchema;

fn main() {
    println!("persona_core ping={}", persona_core::ping());
    println!("persona_core version={}", persona_core::core_version());

    let schema = AttributeSchema::person();
    println!("schema version={}", schema.version());
    for field in schema.current_fields() {
        let marker = if field.full { " (wide)" } else { "" };
        println!("field {}{}", field.id, marker);
    }
}
