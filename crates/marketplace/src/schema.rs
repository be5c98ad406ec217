//! The marketplace schema.
//!
//! Entity, relation and constraint names here are what the repositories and
//! error messages refer to.

use marketplace_core::{
    ConstraintDef, DefaultValue, EntityDef, FieldDef, FieldType, RelationDef, ScalarType,
    SchemaBundle,
};

/// User entity name.
pub const USER: &str = "User";
/// Client profile entity name.
pub const CLIENT: &str = "Client";
/// Seller profile entity name.
pub const SELLER: &str = "Seller";
/// Product entity name.
pub const PRODUCT: &str = "Product";
/// Message entity name.
pub const MESSAGE: &str = "Message";
/// Notification entity name.
pub const NOTIFICATION: &str = "Notification";

/// Name of the role enum type.
pub const ROLE_ENUM: &str = "Role";

/// Price column: up to 8 integer digits and 2 fraction digits.
pub const PRICE_PRECISION: u8 = 10;
/// Price scale.
pub const PRICE_SCALE: u8 = 2;

fn id() -> FieldDef {
    FieldDef::new("id", FieldType::scalar(ScalarType::Uuid))
}

fn created_at() -> FieldDef {
    FieldDef::new("created_at", FieldType::scalar(ScalarType::Timestamp))
        .with_default(DefaultValue::CurrentTimestamp)
}

fn string(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::scalar(ScalarType::String))
}

fn reference(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::scalar(ScalarType::Uuid)).with_index()
}

/// Build the schema bundle for the marketplace.
pub fn marketplace_schema() -> SchemaBundle {
    let user = EntityDef::new(USER, "id").with_fields([
        id(),
        string("email").with_index(),
        string("username").with_index(),
        string("password"),
        FieldDef::new(
            "role",
            FieldType::enum_type(ROLE_ENUM, vec!["CLIENT".into(), "SELLER".into()]),
        ),
        FieldDef::optional_scalar("profile_picture", ScalarType::String),
        created_at(),
    ]);

    let client = EntityDef::new(CLIENT, "id").with_fields([
        id(),
        reference("user_id"),
        string("firstname"),
        string("lastname"),
        created_at(),
    ]);

    let seller = EntityDef::new(SELLER, "id").with_fields([
        id(),
        reference("user_id"),
        string("business_name"),
        created_at(),
    ]);

    let product = EntityDef::new(PRODUCT, "id").with_fields([
        id(),
        reference("seller_id"),
        string("name"),
        string("description"),
        FieldDef::new(
            "price",
            FieldType::scalar(ScalarType::Decimal {
                precision: PRICE_PRECISION,
                scale: PRICE_SCALE,
            }),
        ),
        FieldDef::new("stock", FieldType::scalar(ScalarType::Int32)),
        created_at(),
    ]);

    let message = EntityDef::new(MESSAGE, "id").with_fields([
        id(),
        reference("sender_id"),
        reference("recipient_id"),
        string("content"),
        created_at(),
    ]);

    let notification = EntityDef::new(NOTIFICATION, "id").with_fields([
        id(),
        reference("user_id"),
        string("content"),
        created_at(),
    ]);

    let relations = [
        RelationDef::one_to_one("client_user", CLIENT, "user_id", USER, "id"),
        RelationDef::one_to_one("seller_user", SELLER, "user_id", USER, "id"),
        RelationDef::one_to_many("product_seller", PRODUCT, "seller_id", SELLER, "id"),
        RelationDef::one_to_many("message_sender", MESSAGE, "sender_id", USER, "id"),
        RelationDef::one_to_many("message_recipient", MESSAGE, "recipient_id", USER, "id"),
        RelationDef::one_to_many("notification_user", NOTIFICATION, "user_id", USER, "id"),
    ];

    let mut bundle = SchemaBundle::new(0)
        .with_entity(user)
        .with_entity(client)
        .with_entity(seller)
        .with_entity(product)
        .with_entity(message)
        .with_entity(notification)
        .with_constraint(ConstraintDef::unique("user_email_unique", USER, "email"))
        .with_constraint(ConstraintDef::unique("user_username_unique", USER, "username"))
        .with_constraint(ConstraintDef::unique("client_user_unique", CLIENT, "user_id"))
        .with_constraint(ConstraintDef::unique("seller_user_unique", SELLER, "user_id"));

    // Each relation gets a foreign key of the same name.
    for relation in relations {
        let relation = relation.cascade();
        bundle = bundle
            .with_constraint(ConstraintDef::foreign_key(
                relation.name.clone(),
                relation.from_entity.clone(),
                relation.from_field.clone(),
                relation.to_entity.clone(),
                relation.to_field.clone(),
            ))
            .with_relation(relation);
    }

    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace_core::DeleteBehavior;

    #[test]
    fn test_every_relation_cascades_and_has_a_foreign_key() {
        let schema = marketplace_schema();

        assert_eq!(schema.entities.len(), 6);
        assert_eq!(schema.relations.len(), 6);
        for relation in schema.relations.values() {
            assert_eq!(relation.on_delete, DeleteBehavior::Cascade);
            assert!(schema
                .constraints_for(&relation.from_entity)
                .iter()
                .any(|c| c.is_foreign_key() && c.name() == relation.name));
        }
    }

    #[test]
    fn test_user_uniques_and_relations() {
        let schema = marketplace_schema();

        assert!(schema.unique_constraint_on(USER, "email").is_some());
        assert!(schema.unique_constraint_on(USER, "username").is_some());
        assert!(schema.unique_constraint_on(CLIENT, "user_id").is_some());
        assert!(schema.unique_constraint_on(SELLER, "user_id").is_some());

        let into_user: Vec<&str> = schema
            .relations_to(USER)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(
            into_user,
            vec![
                "client_user",
                "message_recipient",
                "message_sender",
                "notification_user",
                "seller_user",
            ]
        );
    }

    #[test]
    fn test_role_is_required_enum() {
        let schema = marketplace_schema();
        let role = schema.get_entity(USER).unwrap().get_field("role").unwrap();

        assert!(role.required);
        assert!(role.default.is_none());
        assert_eq!(
            role.field_type.enum_variants(),
            Some(&["CLIENT".to_string(), "SELLER".to_string()][..])
        );
    }

    #[test]
    fn test_schema_is_stable() {
        assert!(marketplace_schema().same_definitions(&marketplace_schema()));
    }
}
