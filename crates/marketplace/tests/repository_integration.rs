//! End-to-end tests of the repositories against a real database.

use marketplace::engine::error::ValidationError;
use marketplace::engine::{NewRecord, Value};
use marketplace::{
    ClientConfig, CreateClient, CreateMessage, CreateNotification, CreateProduct, CreateSeller,
    CreateUser, Error, Id, MarketplaceClient, Role, UpdateUser, UserWithProfile,
};

struct TestContext {
    client: MarketplaceClient,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let client = MarketplaceClient::open(ClientConfig::new(dir.path())).unwrap();
        Self { client, _dir: dir }
    }

    fn buyer(&self, name: &str) -> UserWithProfile {
        self.client
            .users()
            .create(CreateUser::client(
                format!("{name}@example.com"),
                name,
                "password123",
                CreateClient::new(name, "Buyer"),
            ))
            .unwrap()
    }

    fn vendor(&self, name: &str) -> UserWithProfile {
        self.client
            .users()
            .create(CreateUser::seller(
                format!("{name}@example.com"),
                name,
                "password123",
                CreateSeller::new(format!("{name} Ltd")),
            ))
            .unwrap()
    }

    fn product(&self, seller_id: Id, name: &str) -> marketplace::Product {
        self.client
            .products()
            .create(CreateProduct::new(
                seller_id,
                name,
                format!("A {name}"),
                "19.99".parse().unwrap(),
                5,
            ))
            .unwrap()
    }
}

#[test]
fn test_client_role_gets_client_profile_only() {
    let ctx = TestContext::new();
    let created = ctx.buyer("ada");

    assert_eq!(created.user.role, Role::Client);
    let client = created.client.expect("client profile");
    assert_eq!(client.user_id, created.user.id);
    assert_eq!(client.firstname, "ada");
    assert!(created.seller.is_none());

    let loaded = ctx
        .client
        .users()
        .find_with_profile(created.user.id)
        .unwrap()
        .unwrap();
    assert_eq!(loaded.client, Some(client));
    assert!(loaded.seller.is_none());
}

#[test]
fn test_seller_role_gets_seller_profile_only() {
    let ctx = TestContext::new();
    let created = ctx.vendor("acme");

    assert_eq!(created.user.role, Role::Seller);
    assert!(created.client.is_none());
    let seller = created.seller.expect("seller profile");
    assert_eq!(seller.business_name, "acme Ltd");
    assert_eq!(
        ctx.client
            .profiles()
            .find_seller_by_user(created.user.id)
            .unwrap(),
        Some(seller)
    );
}

#[test]
fn test_duplicate_email_or_username_is_rejected() {
    let ctx = TestContext::new();
    ctx.buyer("ada");

    let same_email = CreateUser::client(
        "ada@example.com",
        "someone-else",
        "password123",
        CreateClient::new("A", "B"),
    );
    let err = ctx.client.users().create(same_email).unwrap_err();
    assert!(err.is_constraint_violation());
    assert!(matches!(err, Error::UniqueViolation { ref field, .. } if field == "email"));

    let same_username = CreateUser::client(
        "other@example.com",
        "ada",
        "password123",
        CreateClient::new("A", "B"),
    );
    let err = ctx.client.users().create(same_username).unwrap_err();
    assert!(matches!(err, Error::UniqueViolation { ref field, .. } if field == "username"));

    // Neither attempt left a user or an orphaned profile behind.
    assert_eq!(ctx.client.users().count().unwrap(), 1);
    assert_eq!(ctx.client.profiles().list_clients().unwrap().len(), 1);
}

#[test]
fn test_missing_role_is_rejected() {
    let ctx = TestContext::new();
    let input = CreateUser::new("nobody@example.com", "nobody", "password123")
        .with_client(CreateClient::new("No", "Body"));

    let err = ctx.client.users().create(input).unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::MissingField { ref field, .. }) if field == "role"
    ));
    assert_eq!(ctx.client.users().count().unwrap(), 0);
    assert_eq!(ctx.client.profiles().list_clients().unwrap().len(), 0);
}

#[test]
fn test_role_outside_enum_is_rejected() {
    let ctx = TestContext::new();
    assert!("ADMIN".parse::<Role>().unwrap_err().is_validation());

    // The schema rejects it too when the typed input is bypassed.
    let err = ctx
        .client
        .database()
        .mutations()
        .insert(
            "User",
            vec![
                ("email".into(), Value::from("root@example.com")),
                ("username".into(), Value::from("root")),
                ("password".into(), Value::from("password123")),
                ("role".into(), Value::from("ADMIN")),
            ],
        )
        .map_err(Error::from)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::InvalidEnumValue { ref value, .. }) if value == "ADMIN"
    ));
    assert_eq!(ctx.client.users().count().unwrap(), 0);
}

#[test]
fn test_profile_must_match_role() {
    let ctx = TestContext::new();
    let input = CreateUser::new("s@example.com", "shop", "password123")
        .with_role(Role::Seller)
        .with_client(CreateClient::new("Not", "Seller"));

    let err = ctx.client.users().create(input).unwrap_err();
    assert!(matches!(err, Error::ProfileMismatch { role: Role::Seller, .. }));
    assert!(ctx
        .client
        .users()
        .find_by_email("s@example.com")
        .unwrap()
        .is_none());
}

#[test]
fn test_short_password_never_reaches_storage() {
    let ctx = TestContext::new();
    let err = ctx
        .client
        .users()
        .create(CreateUser::client(
            "p@example.com",
            "pat",
            "short",
            CreateClient::new("Pat", "Short"),
        ))
        .unwrap_err();
    assert!(matches!(err, Error::PasswordTooShort { min: 8 }));
    assert_eq!(ctx.client.users().count().unwrap(), 0);

    let user = ctx.buyer("ada");
    let err = ctx
        .client
        .users()
        .update(user.user.id, UpdateUser::new().password("1234567"))
        .unwrap_err();
    assert!(matches!(err, Error::PasswordTooShort { .. }));
}

#[test]
fn test_failed_nested_create_leaves_nothing_behind() {
    let ctx = TestContext::new();
    let user = NewRecord::new("User", Vec::new())
        .with("email", "half@example.com")
        .with("username", "half")
        .with("password", "password123")
        .with("role", "CLIENT");
    // Profile lacks its last name.
    let profile = NewRecord::new("Client", Vec::new())
        .with("user_id", Value::Uuid(user.id))
        .with("firstname", "Half");

    let result = ctx.client.database().mutations().insert_batch(vec![user, profile]);
    assert!(result.is_err());
    assert!(ctx
        .client
        .users()
        .find_by_username("half")
        .unwrap()
        .is_none());
    assert_eq!(ctx.client.users().count().unwrap(), 0);
}

#[test]
fn test_find_by_id_email_and_username() {
    let ctx = TestContext::new();
    let ada = ctx.buyer("ada");
    ctx.vendor("acme");

    let users = ctx.client.users();
    assert_eq!(users.find_by_id(ada.user.id).unwrap(), Some(ada.user.clone()));
    assert_eq!(
        users.find_by_email("ada@example.com").unwrap(),
        Some(ada.user.clone())
    );
    assert_eq!(users.find_by_username("ada").unwrap(), Some(ada.user.clone()));
    assert!(users.find_by_username("nobody").unwrap().is_none());
    assert!(users.find_by_id(Id::generate()).unwrap().is_none());

    let listed: Vec<String> = users.list().unwrap().into_iter().map(|u| u.username).collect();
    assert_eq!(listed, vec!["ada", "acme"]);
}

#[test]
fn test_profile_picture_can_be_set_and_cleared() {
    let ctx = TestContext::new();
    let ada = ctx.buyer("ada");
    assert!(ada.user.profile_picture.is_none());

    let users = ctx.client.users();
    let updated = users
        .update(
            ada.user.id,
            UpdateUser::new().profile_picture("https://img.example.com/ada.png"),
        )
        .unwrap();
    assert_eq!(
        updated.profile_picture.as_deref(),
        Some("https://img.example.com/ada.png")
    );

    users
        .update(ada.user.id, UpdateUser::new().clear_profile_picture())
        .unwrap();
    let reloaded = users.find_by_id(ada.user.id).unwrap().unwrap();
    assert_eq!(reloaded.profile_picture, None);
    assert_eq!(reloaded.email, "ada@example.com");
}

#[test]
fn test_update_moves_unique_values() {
    let ctx = TestContext::new();
    let ada = ctx.buyer("ada");
    ctx.buyer("bob");

    let users = ctx.client.users();
    let err = users
        .update(ada.user.id, UpdateUser::new().email("bob@example.com"))
        .unwrap_err();
    assert!(matches!(err, Error::UniqueViolation { ref field, .. } if field == "email"));

    users
        .update(ada.user.id, UpdateUser::new().email("ada@new.example.com"))
        .unwrap();
    assert!(users.find_by_email("ada@example.com").unwrap().is_none());
    assert_eq!(
        users
            .find_by_email("ada@new.example.com")
            .unwrap()
            .map(|u| u.id),
        Some(ada.user.id)
    );

    let err = users.update(Id::generate(), UpdateUser::new()).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_product_connects_to_seller() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor("acme");
    let seller = vendor.seller.unwrap();

    let product = ctx.product(seller.id, "Lamp");
    assert_eq!(product.seller_id, seller.id);
    assert_eq!(product.price.to_string(), "19.99");

    let with_seller = ctx
        .client
        .products()
        .find_with_seller(product.id)
        .unwrap()
        .unwrap();
    assert_eq!(with_seller.seller.id, seller.id);
    assert_eq!(with_seller.product, product);
}

#[test]
fn test_product_with_non_seller_id_is_not_found() {
    let ctx = TestContext::new();
    let buyer = ctx.buyer("ada");
    let vendor = ctx.vendor("acme");

    let candidates = [
        buyer.client.unwrap().id,
        buyer.user.id,
        vendor.user.id,
        Id::generate(),
    ];
    for id in candidates {
        let err = ctx
            .client
            .products()
            .create(CreateProduct::new(
                id,
                "Lamp",
                "Desk lamp",
                "9.50".parse().unwrap(),
                1,
            ))
            .unwrap_err();
        assert!(err.is_not_found(), "{err}");
        assert!(matches!(
            err,
            Error::RelationNotFound { ref relation, ref entity, .. }
                if relation == "product_seller" && entity == "Seller"
        ));
    }
    assert_eq!(ctx.client.products().count().unwrap(), 0);
}

#[test]
fn test_product_stock_rules() {
    let ctx = TestContext::new();
    let seller = ctx.vendor("acme").seller.unwrap();
    let product = ctx.product(seller.id, "Lamp");

    let products = ctx.client.products();
    assert_eq!(products.update_stock(product.id, 0).unwrap().stock, 0);
    assert!(products.update_stock(product.id, -3).unwrap_err().is_validation());
    assert_eq!(products.find_by_id(product.id).unwrap().unwrap().stock, 0);

    let err = products
        .create(CreateProduct::new(
            seller.id,
            "Chair",
            "Chair",
            "10".parse().unwrap(),
            -1,
        ))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput { field: "stock", .. }));
}

#[test]
fn test_deleting_a_user_cascades() {
    let ctx = TestContext::new();
    let ada = ctx.buyer("ada");
    let bob = ctx.buyer("bob");
    let acme = ctx.vendor("acme");
    let (a, b, s) = (ada.user.id, bob.user.id, acme.user.id);

    let messages = ctx.client.messages();
    messages.send(CreateMessage::new(a, b, "hi bob")).unwrap();
    messages.send(CreateMessage::new(b, a, "hi ada")).unwrap();
    messages.send(CreateMessage::new(a, a, "note to self")).unwrap();
    let kept = messages.send(CreateMessage::new(b, s, "price?")).unwrap();

    let notifications = ctx.client.notifications();
    notifications.create(CreateNotification::new(a, "welcome")).unwrap();
    notifications.create(CreateNotification::new(a, "sale")).unwrap();
    notifications.create(CreateNotification::new(b, "welcome")).unwrap();

    let summary = ctx.client.users().delete(a).unwrap();
    assert_eq!(summary.count("User"), 1);
    assert_eq!(summary.count("Client"), 1);
    assert_eq!(summary.count("Message"), 3);
    assert_eq!(summary.count("Notification"), 2);
    assert_eq!(summary.total(), 7);

    assert!(ctx.client.users().find_by_id(a).unwrap().is_none());
    assert!(ctx.client.profiles().find_client_by_user(a).unwrap().is_none());
    assert!(messages.list_sent(a).unwrap().is_empty());
    assert!(messages.list_received(a).unwrap().is_empty());
    assert!(notifications.list_for_user(a).unwrap().is_empty());

    assert_eq!(messages.list_sent(b).unwrap(), vec![kept]);
    assert_eq!(notifications.list_for_user(b).unwrap().len(), 1);

    let err = ctx.client.users().delete(a).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn test_deleting_a_seller_removes_its_products() {
    let ctx = TestContext::new();
    let acme = ctx.vendor("acme");
    let other = ctx.vendor("other");
    let acme_seller = acme.seller.unwrap().id;
    let other_seller = other.seller.unwrap().id;

    ctx.product(acme_seller, "Lamp");
    ctx.product(acme_seller, "Desk");
    let survivor = ctx.product(other_seller, "Chair");

    let summary = ctx.client.users().delete(acme.user.id).unwrap();
    assert_eq!(summary.count("Seller"), 1);
    assert_eq!(summary.count("Product"), 2);

    assert!(ctx.client.profiles().find_seller(acme_seller).unwrap().is_none());
    assert!(ctx.client.products().list_by_seller(acme_seller).unwrap().is_empty());
    assert_eq!(ctx.client.products().list().unwrap(), vec![survivor]);
}

#[test]
fn test_deleted_user_frees_email_and_username() {
    let ctx = TestContext::new();
    let ada = ctx.buyer("ada");
    ctx.client.users().delete(ada.user.id).unwrap();

    let again = ctx.buyer("ada");
    assert_ne!(again.user.id, ada.user.id);
    assert_eq!(
        ctx.client
            .users()
            .find_by_email("ada@example.com")
            .unwrap()
            .map(|u| u.id),
        Some(again.user.id)
    );
}

#[test]
fn test_message_requires_live_users() {
    let ctx = TestContext::new();
    let ada = ctx.buyer("ada");
    let seller = ctx.vendor("acme").seller.unwrap();

    // A seller profile id is not a user id.
    let err = ctx
        .client
        .messages()
        .send(CreateMessage::new(ada.user.id, seller.id, "hello"))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::RelationNotFound { ref relation, .. } if relation == "message_recipient"
    ));

    let err = ctx
        .client
        .notifications()
        .create(CreateNotification::new(Id::generate(), "lost"))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_single_records_can_be_deleted() {
    let ctx = TestContext::new();
    let ada = ctx.buyer("ada");
    let seller = ctx.vendor("acme").seller.unwrap();
    let product = ctx.product(seller.id, "Lamp");
    let message = ctx
        .client
        .messages()
        .send(CreateMessage::new(ada.user.id, ada.user.id, "memo"))
        .unwrap();
    let notification = ctx
        .client
        .notifications()
        .create(CreateNotification::new(ada.user.id, "hi"))
        .unwrap();

    assert_eq!(ctx.client.products().delete(product.id).unwrap().total(), 1);
    assert_eq!(ctx.client.messages().delete(message.id).unwrap().total(), 1);
    assert_eq!(
        ctx.client
            .notifications()
            .delete(notification.id)
            .unwrap()
            .total(),
        1
    );

    assert!(ctx.client.products().find_by_id(product.id).unwrap().is_none());
    assert!(ctx.client.messages().find_by_id(message.id).unwrap().is_none());
    assert!(ctx
        .client
        .notifications()
        .find_by_id(notification.id)
        .unwrap()
        .is_none());
    assert!(ctx.client.users().find_by_id(ada.user.id).unwrap().is_some());
}

#[test]
fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let user_id;
    {
        let client = MarketplaceClient::open(ClientConfig::new(dir.path())).unwrap();
        let created = client
            .users()
            .create(CreateUser::seller(
                "keep@example.com",
                "keeper",
                "password123",
                CreateSeller::new("Keep Co"),
            ))
            .unwrap();
        user_id = created.user.id;
        client.flush().unwrap();
    }

    let client = MarketplaceClient::open(ClientConfig::new(dir.path())).unwrap();
    assert_eq!(client.schema_version(), 1);

    let loaded = client.users().find_with_profile(user_id).unwrap().unwrap();
    assert_eq!(loaded.user.username, "keeper");
    assert_eq!(loaded.seller.unwrap().business_name, "Keep Co");

    // Unique claims persist as well.
    let err = client
        .users()
        .create(CreateUser::client(
            "keep@example.com",
            "other",
            "password123",
            CreateClient::new("A", "B"),
        ))
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

#[test]
fn test_stats_count_every_entity() {
    let ctx = TestContext::new();
    let ada = ctx.buyer("ada");
    let seller = ctx.vendor("acme").seller.unwrap();
    ctx.product(seller.id, "Lamp");
    ctx.client
        .notifications()
        .create(CreateNotification::new(ada.user.id, "hi"))
        .unwrap();

    let stats = ctx.client.stats().unwrap();
    assert_eq!(stats.users, 2);
    assert_eq!(stats.clients, 1);
    assert_eq!(stats.sellers, 1);
    assert_eq!(stats.products, 1);
    assert_eq!(stats.messages, 0);
    assert_eq!(stats.notifications, 1);
}

#[test]
fn test_bulk_cleanup_empties_store() {
    let ctx = TestContext::new();
    let ada = ctx.buyer("ada");
    let bob = ctx.buyer("bob");
    let acme = ctx.vendor("acme");
    let seller = acme.seller.clone().unwrap();
    ctx.product(seller.id, "Lamp");
    ctx.product(seller.id, "Desk");
    ctx.client
        .messages()
        .send(CreateMessage::new(ada.user.id, acme.user.id, "in stock?"))
        .unwrap();
    ctx.client
        .notifications()
        .create(CreateNotification::new(bob.user.id, "welcome"))
        .unwrap();

    let profiles = ctx.client.profiles();
    let clients = profiles.delete_all_clients().unwrap();
    assert_eq!(clients.matched, 2);
    assert_eq!(clients.total(), 2);

    let sellers = profiles.delete_all_sellers().unwrap();
    assert_eq!(sellers.matched, 1);
    assert_eq!(sellers.count("Product"), 2);

    let users = ctx.client.users().delete_all().unwrap();
    assert_eq!(users.matched, 3);
    assert_eq!(users.count("User"), 3);
    assert_eq!(users.count("Message"), 1);
    assert_eq!(users.count("Notification"), 1);

    let stats = ctx.client.stats().unwrap();
    assert_eq!(
        (
            stats.users,
            stats.clients,
            stats.sellers,
            stats.products,
            stats.messages,
            stats.notifications
        ),
        (0, 0, 0, 0, 0, 0)
    );

    // A second pass has nothing left to remove.
    assert_eq!(ctx.client.users().delete_all().unwrap().total(), 0);

    // Emails and usernames are free again.
    let again = ctx.buyer("ada");
    assert_eq!(again.user.email, "ada@example.com");
}

#[test]
fn test_deleted_user_leaves_no_readable_versions() {
    let ctx = TestContext::new();
    let ada = ctx.buyer("ada");
    let id = ada.user.id;

    ctx.client
        .users()
        .update(id, UpdateUser::new().password("newsecret99"))
        .unwrap();
    let storage = ctx.client.database().storage();
    assert_eq!(storage.scan_versions(id.as_bytes()).count(), 1);

    let client_id = ada.client.unwrap().id;
    ctx.client.users().delete(id).unwrap();

    for record_id in [id, client_id] {
        let live: Vec<_> = storage
            .scan_versions(record_id.as_bytes())
            .map(|entry| entry.unwrap().1)
            .filter(|record| !record.deleted)
            .collect();
        assert!(live.is_empty());
    }
}
