use crate::database::{MongoDB, USERS_COLLECTION};
use crate::domain::{User, UserRepository, UserRole};
use crate::utils::{AppError, AppResult, PaginatedResponse, PaginationMeta, PaginationParams};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use serde::{Deserialize, Serialize};

const DUPLICATE_KEY: i32 = 11000;

/// Stored shape of a user in the `users` collection.
#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    // Absent rather than null so the sparse unique indexes skip them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    password_hash: String,
    #[serde(default)]
    role: UserRole,
    #[serde(default = "default_active")]
    is_active: bool,
    created_at: bson::DateTime,
    #[serde(default)]
    updated_at: Option<bson::DateTime>,
}

fn default_active() -> bool {
    true
}

fn to_bson_datetime(dt: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(dt.timestamp_millis())
}

fn to_chrono(dt: bson::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or_default()
}

impl UserDocument {
    fn from_user(user: &User, password_hash: &str) -> Self {
        Self {
            id: None,
            email: user.email.clone(),
            phone: user.phone.clone(),
            password_hash: password_hash.to_string(),
            role: user.role,
            is_active: user.is_active,
            created_at: to_bson_datetime(Utc::now()),
            updated_at: None,
        }
    }

    fn into_user(self) -> User {
        User {
            id: self.id.map(|oid| oid.to_hex()),
            email: self.email,
            phone: self.phone,
            role: self.role,
            is_active: self.is_active,
            created_at: to_chrono(self.created_at),
            updated_at: self.updated_at.map(to_chrono),
        }
    }

    fn into_user_with_password(mut self) -> (User, String) {
        let hash = std::mem::take(&mut self.password_hash);
        (self.into_user(), hash)
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn map_write_error(e: mongodb::error::Error) -> AppError {
    if is_duplicate_key(&e) {
        AppError::conflict("User with this email or phone already exists", "user")
    } else {
        e.into()
    }
}

/// MongoDB implementation of the user repository.
#[derive(Clone)]
pub struct MongoUserRepository {
    db: MongoDB,
    users: Collection<UserDocument>,
}

impl MongoUserRepository {
    pub fn new(db: MongoDB) -> Self {
        let users = db.collection(USERS_COLLECTION);
        Self { db, users }
    }

    async fn find_one(&self, filter: Document) -> AppResult<Option<UserDocument>> {
        Ok(self.users.find_one(filter).await?)
    }

    async fn paginate(
        &self,
        filter: Document,
        pagination: PaginationParams,
    ) -> AppResult<PaginatedResponse<User>> {
        let total = self.users.count_documents(filter.clone()).await?;

        let limit = i64::try_from(pagination.limit()).unwrap_or(i64::MAX);
        let documents: Vec<UserDocument> = self
            .users
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .skip(pagination.skip())
            .limit(limit)
            .await?
            .try_collect()
            .await?;

        Ok(PaginatedResponse {
            items: documents.into_iter().map(UserDocument::into_user).collect(),
            meta: PaginationMeta::create(total, pagination.page, pagination.page_size),
        })
    }

    /// `$set`/`$unset` update for the mutable user fields plus `updated_at`.
    fn update_document(user: &User) -> Document {
        let mut set = doc! {
            "role": user.role.as_str(),
            "is_active": user.is_active,
            "updated_at": to_bson_datetime(Utc::now()),
        };
        let mut unset = Document::new();

        for (field, value) in [("email", &user.email), ("phone", &user.phone)] {
            match value {
                Some(v) => {
                    set.insert(field, v.clone());
                }
                None => {
                    unset.insert(field, "");
                }
            }
        }

        let mut update = doc! { "$set": set };
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        update
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn create(&self, user: User, password_hash: &str) -> AppResult<User> {
        let mut document = UserDocument::from_user(&user, password_hash);

        let result = self
            .users
            .insert_one(&document)
            .await
            .map_err(map_write_error)?;

        document.id = result.inserted_id.as_object_id();
        Ok(document.into_user())
    }

    async fn get_by_id(&self, user_id: &str) -> AppResult<Option<User>> {
        let Ok(oid) = ObjectId::parse_str(user_id) else {
            return Ok(None);
        };
        Ok(self
            .find_one(doc! { "_id": oid })
            .await?
            .map(UserDocument::into_user))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .find_one(doc! { "email": email })
            .await?
            .map(UserDocument::into_user))
    }

    async fn get_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        Ok(self
            .find_one(doc! { "phone": phone })
            .await?
            .map(UserDocument::into_user))
    }

    async fn get_by_email_with_password(&self, email: &str) -> AppResult<Option<(User, String)>> {
        Ok(self
            .find_one(doc! { "email": email })
            .await?
            .map(UserDocument::into_user_with_password))
    }

    async fn get_by_phone_with_password(&self, phone: &str) -> AppResult<Option<(User, String)>> {
        Ok(self
            .find_one(doc! { "phone": phone })
            .await?
            .map(UserDocument::into_user_with_password))
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let Some(oid) = user.id.as_deref().and_then(|id| ObjectId::parse_str(id).ok()) else {
            return Err(AppError::not_found("User not found", "user"));
        };

        self.users
            .find_one_and_update(doc! { "_id": oid }, Self::update_document(user))
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_write_error)?
            .map(UserDocument::into_user)
            .ok_or_else(|| AppError::not_found("User not found", "user"))
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> AppResult<bool> {
        let Ok(oid) = ObjectId::parse_str(user_id) else {
            return Ok(false);
        };

        let result = self
            .users
            .update_one(
                doc! { "_id": oid },
                doc! { "$set": {
                    "password_hash": password_hash,
                    "updated_at": to_bson_datetime(Utc::now()),
                } },
            )
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn deactivate(&self, user: &User) -> AppResult<User> {
        let deactivated = User {
            is_active: false,
            ..user.clone()
        };
        self.update(&deactivated).await
    }

    async fn list_active(&self, pagination: PaginationParams) -> AppResult<PaginatedResponse<User>> {
        self.paginate(doc! { "is_active": true }, pagination).await
    }

    async fn list_by_role(
        &self,
        role: UserRole,
        pagination: PaginationParams,
    ) -> AppResult<PaginatedResponse<User>> {
        self.paginate(doc! { "role": role.as_str(), "is_active": true }, pagination)
            .await
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(self.db.ping().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(email: Option<&str>, phone: Option<&str>) -> UserDocument {
        UserDocument {
            id: Some(ObjectId::new()),
            email: email.map(String::from),
            phone: phone.map(String::from),
            password_hash: "$2b$04$hash".into(),
            role: UserRole::Instructor,
            is_active: true,
            created_at: bson::DateTime::from_millis(1_700_000_000_000),
            updated_at: None,
        }
    }

    #[test]
    fn test_absent_contact_fields_are_not_serialized() {
        let document = bson::to_document(&stored(Some("a@b.com"), None)).unwrap();
        assert!(document.contains_key("email"));
        assert!(!document.contains_key("phone"));
        assert_eq!(document.get_str("role").unwrap(), "instructor");
    }

    #[test]
    fn test_document_to_entity() {
        let document = stored(None, Some("+1234567890"));
        let oid = document.id.unwrap();

        let (user, hash) = document.into_user_with_password();
        assert_eq!(user.id.as_deref(), Some(oid.to_hex().as_str()));
        assert_eq!(user.phone.as_deref(), Some("+1234567890"));
        assert_eq!(user.role, UserRole::Instructor);
        assert_eq!(user.created_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(hash, "$2b$04$hash");
    }

    #[test]
    fn test_update_unsets_cleared_fields() {
        let mut user = User::new(Some("a@b.com".into()), None, UserRole::Student);
        user.id = Some(ObjectId::new().to_hex());

        let update = MongoUserRepository::update_document(&user);
        let set = update.get_document("$set").unwrap();
        let unset = update.get_document("$unset").unwrap();

        assert_eq!(set.get_str("email").unwrap(), "a@b.com");
        assert!(set.contains_key("updated_at"));
        assert!(unset.contains_key("phone"));
        assert!(!set.contains_key("password_hash"));
    }
}
