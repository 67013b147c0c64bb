use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{require_user, ActionError, ActionResult};
use crate::actions::catalogue::ListingCard;
use crate::context::Capabilities;
use crate::document::{to_document, DocumentId, FieldErrors, KeyedReference, ValidationError};
use crate::gate::{GateExit, Redirect};
use crate::identity::{AuthContext, IdentityError, UserProfile};
use crate::mutation::Path;
use crate::queries::{
    USER_EXISTS_QUERY, USER_PROFILE_QUERY, USER_SAVED_IDS_QUERY, USER_SAVED_LISTINGS_QUERY,
};
use crate::schema::{User, USER_TYPE};
use crate::store::DocumentStoreExt;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailsInput {
    pub name: String,
    pub phone: String,
    /// Used only when the identity provider has no address on file.
    #[serde(default)]
    pub email: Option<String>,
}

impl UserDetailsInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = FieldErrors::new();
        errors.min_chars("name", "Name", &self.name, 2);
        errors.min_chars("phone", "Phone", &self.phone, 1);
        errors.finish()
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("name".into(), json!(self.name.trim()));
        fields.insert("phone".into(), json!(self.phone.trim()));
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SavedState {
    pub saved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// What the buyer onboarding form starts with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingPrefill {
    pub default_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct ExistingUser {
    #[serde(rename = "_id")]
    id: DocumentId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedIds {
    #[serde(rename = "_id")]
    id: DocumentId,
    #[serde(rename = "_rev")]
    rev: String,
    #[serde(default)]
    saved_ids: Option<Vec<String>>,
}

async fn existing_user(caps: &Capabilities, user_id: &str) -> ActionResult<Option<ExistingUser>> {
    Ok(caps
        .documents
        .fetch_one(USER_EXISTS_QUERY, json!({ "clerkId": user_id }))
        .await?)
}

/// The caller's identity profile; an unknown user reads as an empty one.
async fn identity_profile(caps: &Capabilities, user_id: &str) -> ActionResult<UserProfile> {
    match caps.identity.get_user(user_id).await {
        Ok(profile) => Ok(profile),
        Err(IdentityError::UserNotFound(_)) => Ok(UserProfile::default()),
        Err(e) => Err(e.into()),
    }
}

/// Create the caller's buyer profile, or refresh it if one exists, and
/// send them home.
pub async fn complete_user_onboarding(
    caps: &Capabilities,
    auth: &AuthContext,
    input: &UserDetailsInput,
) -> ActionResult<Redirect> {
    input.validate()?;
    let user_id = require_user(auth)?;

    let response = match existing_user(caps, user_id).await? {
        Some(user) => caps.documents.patch(&user.id).set_all(input.fields()).commit().await?,
        None => {
            let profile = identity_profile(caps, user_id).await?;
            let email = match profile.primary_email() {
                "" => input.email.as_deref().unwrap_or_default().trim().to_string(),
                email => email.to_string(),
            };
            let user = User {
                clerk_id: user_id.to_string(),
                name: input.name.trim().to_string(),
                email,
                phone: input.phone.trim().to_string(),
                saved_listings: Vec::new(),
                created_at: Utc::now(),
            };
            let id = DocumentId::for_user(user_id)?;
            caps.documents
                .create(to_document(&id, USER_TYPE, &user)?)
                .await?
        }
    };
    caps.announce(&response, &["/"]);

    // Mirror only; the user document above is what decisions read.
    let mut metadata = Map::new();
    metadata.insert("onboardingComplete".into(), Value::Bool(true));
    if let Err(e) = caps.identity.update_user_metadata(user_id, metadata).await {
        tracing::warn!(user_id, error = %e, "failed to mirror onboarding flag");
    }

    tracing::info!(user_id, "buyer onboarding completed");
    Ok(Redirect::Home)
}

pub async fn update_user_profile(
    caps: &Capabilities,
    auth: &AuthContext,
    input: &UserDetailsInput,
) -> ActionResult<()> {
    input.validate()?;
    let user_id = require_user(auth)?;
    let user = existing_user(caps, user_id)
        .await?
        .ok_or(ActionError::NotFound("User"))?;
    let response = caps
        .documents
        .patch(&user.id)
        .set_all(input.fields())
        .commit()
        .await?;
    caps.announce(&response, &["/profile"]);
    Ok(())
}

/// Save the listing if it is not saved, unsave it if it is. The write is
/// guarded by the revision the decision was made on, so two racing toggles
/// cannot both apply.
pub async fn toggle_saved_listing(
    caps: &Capabilities,
    auth: &AuthContext,
    property_id: &str,
) -> ActionResult<SavedState> {
    let user_id = require_user(auth)?;
    let property_id = DocumentId::parse(property_id)?;

    let user: SavedIds = caps
        .documents
        .fetch_one(USER_SAVED_IDS_QUERY, json!({ "clerkId": user_id }))
        .await?
        .ok_or(ActionError::RequiresOnboarding)?;

    let was_saved = user
        .saved_ids
        .unwrap_or_default()
        .iter()
        .any(|id| id == property_id.as_str());

    let listings = Path::field("savedListings");
    let patch = caps.documents.patch(&user.id).if_revision(user.rev);
    let patch = if was_saved {
        patch.unset(&listings.matching("_ref", property_id.as_str()))
    } else {
        let item = serde_json::to_value(KeyedReference::to(&property_id))?;
        patch.append(&listings, vec![item])
    };
    let response = patch.commit().await?;
    caps.announce(&response, &["/saved"]);

    tracing::debug!(user_id, %property_id, saved = !was_saved, "saved listing toggled");
    Ok(SavedState { saved: !was_saved })
}

/// Ids of the caller's saved listings; empty when signed out.
pub async fn saved_ids(caps: &Capabilities, auth: &AuthContext) -> ActionResult<Vec<String>> {
    let Some(user_id) = auth.user_id() else {
        return Ok(Vec::new());
    };
    let user: Option<SavedIds> = caps
        .documents
        .fetch_one(USER_SAVED_IDS_QUERY, json!({ "clerkId": user_id }))
        .await?;
    Ok(user.and_then(|u| u.saved_ids).unwrap_or_default())
}

pub async fn is_property_saved(
    caps: &Capabilities,
    auth: &AuthContext,
    property_id: &str,
) -> ActionResult<bool> {
    Ok(saved_ids(caps, auth).await?.iter().any(|id| id == property_id))
}

/// `/saved`. References to deleted listings are skipped.
pub async fn saved_listings(
    caps: &Capabilities,
    auth: &AuthContext,
) -> Result<Vec<ListingCard>, GateExit> {
    let user_id = auth.user_id().ok_or(Redirect::SignIn)?;
    let cards: Vec<Option<ListingCard>> = caps
        .documents
        .fetch_all(USER_SAVED_LISTINGS_QUERY, json!({ "clerkId": user_id }))
        .await?;
    Ok(cards.into_iter().flatten().collect())
}

/// `/profile`
pub async fn user_account(
    caps: &Capabilities,
    auth: &AuthContext,
) -> Result<UserAccount, GateExit> {
    let user_id = auth.user_id().ok_or(Redirect::SignIn)?;
    caps.documents
        .fetch_one(USER_PROFILE_QUERY, json!({ "clerkId": user_id }))
        .await?
        .ok_or(Redirect::UserOnboarding.into())
}

/// `/onboarding`: buyers who already have a profile go home.
pub async fn user_onboarding_page(
    caps: &Capabilities,
    auth: &AuthContext,
) -> Result<OnboardingPrefill, GateExit> {
    let user_id = auth.user_id().ok_or(Redirect::SignIn)?;
    let existing: Option<Value> = caps
        .documents
        .fetch_one(USER_EXISTS_QUERY, json!({ "clerkId": user_id }))
        .await?;
    if existing.is_some() {
        return Err(Redirect::Home.into());
    }

    let profile = match caps.identity.get_user(user_id).await {
        Ok(profile) => profile,
        Err(IdentityError::UserNotFound(_)) => UserProfile::default(),
        Err(e) => return Err(e.into()),
    };
    let default_name = format!(
        "{} {}",
        profile.first_name.as_deref().unwrap_or_default(),
        profile.last_name.as_deref().unwrap_or_default()
    )
    .trim()
    .to_string();
    Ok(OnboardingPrefill {
        default_name,
        email: profile.primary_email().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{buyer_auth, buyer_doc, property_doc, Harness};
    use crate::identity::IdentityProvider;

    fn details() -> UserDetailsInput {
        UserDetailsInput {
            name: "Bea Buyer".into(),
            phone: "555-0100".into(),
            email: Some("typed@example.com".into()),
        }
    }

    #[tokio::test]
    async fn onboarding_creates_profile_and_mirrors_flag() {
        let h = Harness::new();
        h.add_user("b1", "Bea", "Buyer", "bea@example.com").await;

        let exit = complete_user_onboarding(&h.caps, &buyer_auth("b1"), &details())
            .await
            .unwrap();
        assert_eq!(exit, Redirect::Home);

        let user = h.store.get("user-b1").await.unwrap();
        assert_eq!(user["clerkId"], "b1");
        assert_eq!(user["email"], "bea@example.com");
        assert_eq!(user["savedListings"], json!([]));

        let profile = h.directory.get_user("b1").await.unwrap();
        assert_eq!(profile.public_metadata["onboardingComplete"], true);
    }

    #[tokio::test]
    async fn onboarding_twice_updates_in_place() {
        let h = Harness::with_documents(vec![buyer_doc("b1", &["p1"])]);
        let mut again = details();
        again.name = "Beatrice Buyer".into();
        complete_user_onboarding(&h.caps, &buyer_auth("b1"), &again)
            .await
            .unwrap();

        let users = h.docs_of_type("user").await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["name"], "Beatrice Buyer");
        assert_eq!(users[0]["savedListings"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn onboarding_uses_typed_email_without_identity_profile() {
        let h = Harness::new();
        complete_user_onboarding(&h.caps, &buyer_auth("b2"), &details())
            .await
            .unwrap();
        assert_eq!(h.store.get("user-b2").await.unwrap()["email"], "typed@example.com");
    }

    #[tokio::test]
    async fn toggle_is_an_involution() {
        let h = Harness::with_documents(vec![buyer_doc("b1", &[]), property_doc("p1", "agent-u1")]);
        let auth = buyer_auth("b1");

        let first = toggle_saved_listing(&h.caps, &auth, "p1").await.unwrap();
        assert!(first.saved);
        assert!(is_property_saved(&h.caps, &auth, "p1").await.unwrap());
        let cards = saved_listings(&h.caps, &auth).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].title, "Listing p1");

        let second = toggle_saved_listing(&h.caps, &auth, "p1").await.unwrap();
        assert!(!second.saved);
        assert!(saved_ids(&h.caps, &auth).await.unwrap().is_empty());
        assert_eq!(h.store.get("user-b1").await.unwrap()["savedListings"], json!([]));
    }

    #[tokio::test]
    async fn toggle_only_removes_the_target() {
        let h = Harness::with_documents(vec![buyer_doc("b1", &["p1", "p2"])]);
        toggle_saved_listing(&h.caps, &buyer_auth("b1"), "p1").await.unwrap();
        assert_eq!(
            saved_ids(&h.caps, &buyer_auth("b1")).await.unwrap(),
            vec!["p2".to_string()]
        );
    }

    #[tokio::test]
    async fn toggle_rejects_hostile_ids_and_missing_profiles() {
        let h = Harness::with_documents(vec![buyer_doc("b1", &["p1"])]);
        let err = toggle_saved_listing(&h.caps, &buyer_auth("b1"), "p1\"] || true")
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Invalid(_)));

        let err = toggle_saved_listing(&h.caps, &buyer_auth("nobody"), "p1")
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::RequiresOnboarding));
    }

    #[tokio::test]
    async fn signed_out_visitors_have_no_saved_ids() {
        let h = Harness::new();
        assert!(saved_ids(&h.caps, &AuthContext::anonymous()).await.unwrap().is_empty());
        assert!(matches!(
            saved_listings(&h.caps, &AuthContext::anonymous()).await,
            Err(GateExit::Redirect(Redirect::SignIn))
        ));
    }

    #[tokio::test]
    async fn onboarding_page_prefills_or_sends_home() {
        let h = Harness::with_documents(vec![buyer_doc("b1", &[])]);
        h.add_user("b2", "Cy", "Buyer", "cy@example.com").await;

        assert!(matches!(
            user_onboarding_page(&h.caps, &buyer_auth("b1")).await,
            Err(GateExit::Redirect(Redirect::Home))
        ));
        let prefill = user_onboarding_page(&h.caps, &buyer_auth("b2")).await.unwrap();
        assert_eq!(prefill.default_name, "Cy Buyer");
        assert_eq!(prefill.email, "cy@example.com");
    }

    #[tokio::test]
    async fn account_page_requires_a_profile() {
        let h = Harness::with_documents(vec![buyer_doc("b1", &[])]);
        let account = user_account(&h.caps, &buyer_auth("b1")).await.unwrap();
        assert_eq!(account.email, "bea@example.com");
        assert!(matches!(
            user_account(&h.caps, &buyer_auth("b9")).await,
            Err(GateExit::Redirect(Redirect::UserOnboarding))
        ));
    }
}
