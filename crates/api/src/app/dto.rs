//! Request bodies. Every JSON body (and the `data` field of multipart forms)
//! is one of these, validated before the domain sees it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use easypaies_auth::Role;
use easypaies_core::{EmployeeId, EntityId, ManagementId, PayCode};
use easypaies_payroll::{AbsenceDecision, EmployeeProfile, ManagementContacts, RessourceKind, WeeklySchedule};

// ─── Users ──────────────────────────────────────────────────────────────────

/// Both fields optional so a missing one yields the login-specific message
/// rather than a deserialization error.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "Please tell us your first name!"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Please tell us your last name!"))]
    pub last_name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must have at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupClientRequest {
    #[validate(length(min = 1, message = "Please tell us your first name!"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Please tell us your last name!"))]
    pub last_name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub role: Role,
    pub customer_of: EntityId,
    /// Required for employees; becomes the employee record's matricule.
    pub matricule: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Please provide your current password"))]
    pub password_current: String,
    #[validate(length(min = 8, message = "Password must have at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitPasswordRequest {
    #[validate(length(min = 8, message = "Password must have at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

/// `updateMe` accepts any object; password fields are refused and only the
/// profile fields are kept.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct UpdateMeRequest(pub Map<String, Value>);

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 1))]
    pub first_name: Option<String>,
    #[validate(length(min = 1))]
    pub last_name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(length(equal = 8, message = "The verification code has 8 characters"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1))]
    pub first_name: Option<String>,
    #[validate(length(min = 1))]
    pub last_name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub role: Option<Role>,
    pub manager_of: Option<ManagementId>,
    pub customer_of: Option<EntityId>,
    pub employee_id: Option<EmployeeId>,
}

// ─── Managements ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateManagementRequest {
    #[validate(length(min = 1, message = "A management must have a name"))]
    pub name: String,
    #[serde(flatten)]
    pub contacts: ManagementContacts,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManagementRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_new_collaborator: Option<String>,
    pub email_delete_collaborator: Option<String>,
    pub email_absence_collaborator: Option<String>,
    pub email_salary_element: Option<String>,
    pub email_generate_pay_slip: Option<String>,
    pub email_contact: Option<String>,
}

impl UpdateManagementRequest {
    /// Overlay the provided mailboxes on `contacts`.
    pub fn apply_contacts(&self, contacts: &mut ManagementContacts) {
        let pairs = [
            (&self.email, &mut contacts.email),
            (&self.email_new_collaborator, &mut contacts.email_new_collaborator),
            (&self.email_delete_collaborator, &mut contacts.email_delete_collaborator),
            (&self.email_absence_collaborator, &mut contacts.email_absence_collaborator),
            (&self.email_salary_element, &mut contacts.email_salary_element),
            (&self.email_generate_pay_slip, &mut contacts.email_generate_pay_slip),
            (&self.email_contact, &mut contacts.email_contact),
        ];
        for (update, slot) in pairs {
            if let Some(value) = update {
                *slot = Some(value.clone());
            }
        }
    }
}

// ─── Entities ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntityRequest {
    #[validate(length(min = 1, message = "An entity must have a name"))]
    pub name: String,
    pub management: ManagementId,
    #[serde(default)]
    pub primes: Vec<PayCode>,
    #[serde(default)]
    pub absences: Vec<PayCode>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEntityRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub primes: Option<Vec<PayCode>>,
    pub absences: Option<Vec<PayCode>>,
}

/// `data` field of an absence declaration.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceInput {
    pub employee_id: Option<EmployeeId>,
    #[validate(length(min = 1, message = "An absence must have a code"))]
    pub code: String,
    #[validate(length(min = 1))]
    pub start_date: String,
    #[validate(length(min = 1))]
    pub end_date: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SalaryElementInput {
    pub employee_id: EmployeeId,
    #[validate(length(min = 1, message = "A salary element must have a code"))]
    pub code: String,
    pub value: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SalaryElementsRequest {
    #[validate(length(min = 1, message = "No salary element provided"), nested)]
    pub elements: Vec<SalaryElementInput>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequestBody {
    /// Defaults to the caller's own employee record.
    pub employee_id: Option<EmployeeId>,
    #[validate(range(exclusive_min = 0.0, message = "The amount must be positive"))]
    pub amount: f64,
    #[serde(default)]
    pub reason: String,
}

// ─── Employees ──────────────────────────────────────────────────────────────

/// `data` field of an employee (or HR form) creation.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeInput {
    #[validate(length(min = 1, message = "Please provide the first name"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Please provide the last name"))]
    pub last_name: String,
    pub matricule: Option<String>,
    #[serde(flatten)]
    pub profile: EmployeeProfile,
    #[serde(default)]
    pub schedule: WeeklySchedule,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShortEmployeeRequest {
    pub entity: EntityId,
    #[validate(length(min = 1, message = "Please provide the first name"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Please provide the last name"))]
    pub last_name: String,
    pub matricule: Option<String>,
}

/// Patch of an employee. Known fields are typed; everything else is laid
/// over the profile.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployeeRequest {
    #[validate(length(min = 1))]
    pub first_name: Option<String>,
    #[validate(length(min = 1))]
    pub last_name: Option<String>,
    pub matricule: Option<String>,
    pub schedule: Option<WeeklySchedule>,
    pub departure_type: Option<String>,
    pub departure_date: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PromoteRequest {
    pub matricule: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SalaryValidationRequest {
    /// Required for admins and managers; employers use their own entity.
    pub entity: Option<EntityId>,
    #[validate(length(min = 1, message = "Please provide a message"))]
    pub message: String,
}

/// `data` field of an employee-side absence declaration (notification only).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredAbsenceInput {
    #[validate(length(min = 1, message = "An absence must have a code"))]
    pub code: String,
    #[validate(length(min = 1))]
    pub start_date: String,
    #[validate(length(min = 1))]
    pub end_date: String,
}

// ─── Absence requests ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceRequestInput {
    /// Employers may file on behalf of one of their employees.
    pub employee_id: Option<EmployeeId>,
    #[validate(length(min = 1, message = "An absence must have a code"))]
    pub absence_code: String,
    #[validate(length(min = 1))]
    pub begin_date: String,
    #[validate(length(min = 1))]
    pub end_date: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DecisionRequest {
    pub decision: AbsenceDecision,
}

// ─── Ressources & contact ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRessourceRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RessourceKind,
    #[validate(length(min = 1))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WebsiteContactRequest {
    #[validate(length(min = 1, message = "Please provide your name"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "Please provide a message"))]
    pub message: String,
}

/// `data` field of an entity contact message.
#[derive(Debug, Deserialize, Validate)]
pub struct EntityContactInput {
    /// Required for admins and managers; employers use their own entity.
    pub entity: Option<EntityId>,
    #[validate(length(min = 1, message = "Please provide a message"))]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_requires_matching_passwords() {
        let body: SignupRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "password": "password1",
            "passwordConfirm": "password2",
        }))
        .unwrap();
        let err = body.validate().unwrap_err();
        assert!(err.field_errors().contains_key("password_confirm"));
    }

    #[test]
    fn salary_elements_validate_each_line() {
        let body: SalaryElementsRequest = serde_json::from_value(serde_json::json!({
            "elements": [{ "employeeId": EmployeeId::new(), "code": "", "value": 10.0 }],
        }))
        .unwrap();
        let err = body.validate().unwrap_err();
        assert!(err.errors().contains_key("elements"));

        let empty: SalaryElementsRequest = serde_json::from_value(serde_json::json!({ "elements": [] })).unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn employee_input_collects_profile_fields() {
        let body: EmployeeInput = serde_json::from_value(serde_json::json!({
            "firstName": "Jean",
            "lastName": "Dupont",
            "matricule": "A12",
            "iban": "FR7630006000011234567890189",
            "city": "Lyon",
        }))
        .unwrap();
        assert_eq!(body.profile.city.as_deref(), Some("Lyon"));
        assert!(body.profile.iban.is_some());
    }

    #[test]
    fn advance_amount_must_be_positive() {
        let body: AdvanceRequestBody = serde_json::from_value(serde_json::json!({ "amount": 0.0 })).unwrap();
        assert!(body.validate().is_err());
    }

    #[test]
    fn management_contacts_are_flattened() {
        let body: CreateManagementRequest = serde_json::from_value(serde_json::json!({
            "name": "Cabinet Durand",
            "emailGeneratePaySlip": "paie@durand.fr",
        }))
        .unwrap();
        assert_eq!(body.contacts.email_generate_pay_slip.as_deref(), Some("paie@durand.fr"));
    }
}
