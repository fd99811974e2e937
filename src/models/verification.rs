use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::errors::{AppError, Result};
use crate::models::{to_utc, User};
use crate::utils::{validate_account_number, validate_bvn, validate_email, validate_nin, validate_phone};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(VerificationStatus::Pending),
            "approved" => Some(VerificationStatus::Approved),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub first_name: Option<String>,
    pub surname: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub local_government: Option<String>,
    pub state_of_residence: Option<String>,
    pub residential_address: Option<String>,
    pub nin_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextOfKin {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub residential_address: Option<String>,
    pub relationship: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub bank_name: Option<String>,
    pub bvn_number: Option<String>,
    pub account_type: Option<String>,
}

/// Web paths (`/uploads/verification/...`) of the three KYC documents.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Documents {
    pub id_document: Option<String>,
    pub passport_photo: Option<String>,
    pub utility_bill: Option<String>,
}

/// Verification sub-record embedded in [`User`].
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    #[serde(default)]
    pub personal: PersonalInfo,
    #[serde(default)]
    pub next_of_kin: NextOfKin,
    #[serde(default)]
    pub bank_details: BankDetails,
    #[serde(default)]
    pub documents: Documents,
    #[serde(default)]
    pub status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime>,
}

/// Body of `POST /api/verification`: the flat form the client submits.
#[derive(Debug, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVerificationDto {
    pub first_name: Option<String>,
    pub surname: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub local_government: Option<String>,
    pub state_of_residence: Option<String>,
    pub residential_address: Option<String>,
    pub nin_number: Option<String>,
    pub kin_full_name: Option<String>,
    pub kin_phone_number: Option<String>,
    pub kin_email: Option<String>,
    pub kin_residential_address: Option<String>,
    pub kin_relationship: Option<String>,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub bank_name: Option<String>,
    pub bvn_number: Option<String>,
    pub account_type: Option<String>,
}

/// The three sub-documents a submission replaces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationDetails {
    pub personal: PersonalInfo,
    pub next_of_kin: NextOfKin,
    pub bank_details: BankDetails,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check(value: &Option<String>, valid: fn(&str) -> bool, message: &str) -> Result<()> {
    match value {
        Some(v) if !valid(v) => Err(AppError::Validation(message.to_string())),
        _ => Ok(()),
    }
}

impl SubmitVerificationDto {
    /// Trims every field, drops blanks and checks the formats of the fields that were given.
    pub fn into_details(self) -> Result<VerificationDetails> {
        let details = VerificationDetails {
            personal: PersonalInfo {
                first_name: clean(self.first_name),
                surname: clean(self.surname),
                phone_number: clean(self.phone_number),
                date_of_birth: clean(self.date_of_birth),
                local_government: clean(self.local_government),
                state_of_residence: clean(self.state_of_residence),
                residential_address: clean(self.residential_address),
                nin_number: clean(self.nin_number),
            },
            next_of_kin: NextOfKin {
                full_name: clean(self.kin_full_name),
                phone_number: clean(self.kin_phone_number),
                email: clean(self.kin_email),
                residential_address: clean(self.kin_residential_address),
                relationship: clean(self.kin_relationship),
            },
            bank_details: BankDetails {
                account_name: clean(self.account_name),
                account_number: clean(self.account_number),
                bank_name: clean(self.bank_name),
                bvn_number: clean(self.bvn_number),
                account_type: clean(self.account_type),
            },
        };

        check(&details.personal.phone_number, validate_phone, "Invalid phone number")?;
        check(&details.personal.nin_number, validate_nin, "NIN must be 11 digits")?;
        check(&details.next_of_kin.phone_number, validate_phone, "Invalid next of kin phone number")?;
        check(&details.next_of_kin.email, validate_email, "Invalid next of kin email")?;
        check(&details.bank_details.account_number, validate_account_number, "Account number must be 10 digits")?;
        check(&details.bank_details.bvn_number, validate_bvn, "BVN must be 11 digits")?;

        Ok(details)
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    pub personal: PersonalInfo,
    pub next_of_kin: NextOfKin,
    pub bank_details: BankDetails,
    pub documents: Documents,
    pub status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub reviewed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reviewed_by: Option<String>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Verification> for VerificationResponse {
    fn from(v: Verification) -> Self {
        VerificationResponse {
            personal: v.personal,
            next_of_kin: v.next_of_kin,
            bank_details: v.bank_details,
            documents: v.documents,
            status: v.status,
            rejection_reason: v.rejection_reason,
            reviewed_at: v.reviewed_at.map(to_utc),
            reviewed_by: v.reviewed_by.map(|id| id.to_hex()),
            submitted_at: v.submitted_at.map(to_utc),
        }
    }
}

/// Read projection returned by `GET /api/verification/status`.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatusResponse {
    pub status: VerificationStatus,
    pub is_verified: bool,
    pub reviewed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&User> for VerificationStatusResponse {
    fn from(user: &User) -> Self {
        VerificationStatusResponse {
            status: user.verification.status,
            is_verified: user.is_verified,
            reviewed_at: user.verification.reviewed_at.map(to_utc),
            submitted_at: user.verification.submitted_at.map(to_utc),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewVerificationDto {
    pub status: String, // "approved" or "rejected"
    pub rejection_reason: Option<String>,
}

/// One row of the admin review queue.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecordResponse {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub is_verified: bool,
    pub verification: VerificationResponse,
}

impl From<User> for VerificationRecordResponse {
    fn from(user: User) -> Self {
        VerificationRecordResponse {
            user_id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name,
            email: user.email,
            phone: user.phone,
            is_verified: user.is_verified,
            verification: user.verification.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_dto() -> SubmitVerificationDto {
        SubmitVerificationDto {
            first_name: Some("Ada".to_string()),
            surname: Some("Obi".to_string()),
            phone_number: Some("08031234567".to_string()),
            date_of_birth: Some("1990-04-12".to_string()),
            local_government: Some("Nassarawa".to_string()),
            state_of_residence: Some("Kano".to_string()),
            residential_address: Some("18B Murtala Muhammad Way".to_string()),
            nin_number: Some("12345678901".to_string()),
            kin_full_name: Some("Chidi Obi".to_string()),
            kin_phone_number: Some("08039876543".to_string()),
            kin_email: Some("chidi@example.com".to_string()),
            kin_residential_address: Some("12 Zoo Road".to_string()),
            kin_relationship: Some("Brother".to_string()),
            account_name: Some("Ada Obi".to_string()),
            account_number: Some("0123456789".to_string()),
            bank_name: Some("Jaiz Bank".to_string()),
            bvn_number: Some("22212345678".to_string()),
            account_type: Some("Savings".to_string()),
        }
    }

    #[test]
    fn test_dto_deserializes_client_field_names() {
        let dto: SubmitVerificationDto = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "kinFullName": "Chidi Obi",
            "bvnNumber": "22212345678",
            "ninNumber": "12345678901"
        }))
        .unwrap();
        let details = dto.into_details().unwrap();
        assert_eq!(details.personal.first_name.as_deref(), Some("Ada"));
        assert_eq!(details.next_of_kin.full_name.as_deref(), Some("Chidi Obi"));
        assert_eq!(details.bank_details.bvn_number.as_deref(), Some("22212345678"));
        assert!(details.bank_details.account_number.is_none());
    }

    #[test]
    fn test_blank_fields_become_absent() {
        let mut dto = full_dto();
        dto.kin_email = Some("   ".to_string());
        dto.surname = Some("  Obi ".to_string());
        let details = dto.into_details().unwrap();
        assert!(details.next_of_kin.email.is_none());
        assert_eq!(details.personal.surname.as_deref(), Some("Obi"));
    }

    #[test]
    fn test_malformed_bank_fields_are_rejected() {
        let mut dto = full_dto();
        dto.account_number = Some("12345".to_string());
        assert!(matches!(dto.into_details(), Err(AppError::Validation(_))));

        let mut dto = full_dto();
        dto.kin_email = Some("chidi-at-example".to_string());
        assert!(matches!(dto.into_details(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(VerificationStatus::parse("Approved"), Some(VerificationStatus::Approved));
        assert_eq!(VerificationStatus::parse("rejected"), Some(VerificationStatus::Rejected));
        assert_eq!(VerificationStatus::parse("submitted"), None);
    }
}
