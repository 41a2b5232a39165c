//! Package repository coordinates shared by every region.

use serde::Serialize;

use crate::error::{PlanError, PlanResult};

/// Number of digits in a provider account id.
pub const ACCOUNT_ID_LEN: usize = 12;

/// Domain, repository and owning account of the replicated package repository.
///
/// The same coordinates address the repository in every region; only the
/// regional endpoint differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryCoordinates {
    domain_name: String,
    repository_name: String,
    owner_account_id: String,
}

impl RepositoryCoordinates {
    /// Validate and build the coordinates.
    ///
    /// # Errors
    ///
    /// - `EmptyConfiguration` when any value is empty.
    /// - `InvalidArgument` when a name contains anything but ASCII
    ///   alphanumerics and hyphens, or the account id is not 12 digits.
    pub fn new(
        domain_name: impl Into<String>,
        repository_name: impl Into<String>,
        owner_account_id: impl Into<String>,
    ) -> PlanResult<Self> {
        let domain_name = validate_name("domain_name", domain_name.into())?;
        let repository_name = validate_name("repository_name", repository_name.into())?;
        let owner_account_id = validate_account_id(owner_account_id.into())?;
        Ok(Self {
            domain_name,
            repository_name,
            owner_account_id,
        })
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    pub fn owner_account_id(&self) -> &str {
        &self.owner_account_id
    }

    /// `{domain}/{repository}`, the repository scope used in identifiers.
    pub fn repository_path(&self) -> String {
        format!("{}/{}", self.domain_name, self.repository_name)
    }
}

fn validate_name(field: &str, value: String) -> PlanResult<String> {
    if value.trim().is_empty() {
        return Err(PlanError::empty(field));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(PlanError::invalid(
            field,
            format!("'{value}' may only contain ASCII letters, digits and hyphens"),
        ));
    }
    Ok(value)
}

fn validate_account_id(value: String) -> PlanResult<String> {
    if value.trim().is_empty() {
        return Err(PlanError::empty("account_id"));
    }
    if value.len() != ACCOUNT_ID_LEN || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(PlanError::invalid(
            "account_id",
            format!("'{value}' must be exactly {ACCOUNT_ID_LEN} digits"),
        ));
    }
    Ok(value)
}
