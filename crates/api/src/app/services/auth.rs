//! Account lifecycle: signup, login, password changes, e-mail verification
//! and the admin user directory.

use chrono::Utc;
use serde_json::Value;

use easypaies_auth::credentials::generate_interim_password;
use easypaies_auth::{NewAccount, Role, UserAccount, account::normalize_email};
use easypaies_core::{Matricule, UserId};
use easypaies_infra::RecordStore;
use easypaies_infra::notify::Notification;
use easypaies_payroll::{Employee, ensure_unique_matricule};

use crate::app::dto;
use crate::app::errors::AppError;
use crate::context::CurrentUser;

use super::AppServices;

pub const BAD_CREDENTIALS: &str = "Incorrect email or password";
pub const UNKNOWN_EMAIL: &str = "Cette adresse email n'est pas enregistrée";
pub const WRONG_CURRENT_PASSWORD: &str = "Your current password is wrong.";
pub const PASSWORD_ROUTE: &str = "This route is not for password updates. Please use /updateMyPassword.";

const ACCOUNT_CHANGED: &str = "The account changed while the mail was being sent. Please try again.";

const PASSWORD_FIELDS: [&str; 3] = ["password", "passwordConfirm", "passwordCurrent"];

/// "jean-marc" -> "Jean-marc"
pub fn capitalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl AppServices {
    fn find_by_email(&self, email: &str) -> Option<UserAccount> {
        let email = normalize_email(email);
        self.users
            .filter(&|u| u.active && u.email == email)
            .into_iter()
            .next()
    }

    fn ensure_email_free(&self, email: &str, except: Option<UserId>) -> Result<(), AppError> {
        let email = normalize_email(email);
        let taken = !self
            .users
            .filter(&|u| u.email == email && Some(u.id) != except)
            .is_empty();
        if taken {
            return Err(duplicate_email(&email));
        }
        Ok(())
    }

    fn store_new_account(&self, account: UserAccount) -> Result<UserAccount, AppError> {
        let email = account.email.clone();
        if !self.users.insert_unique(account.id, account.clone(), &|u| u.email == email) {
            return Err(duplicate_email(&email));
        }
        Ok(account)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<UserAccount, AppError> {
        let account = self
            .find_by_email(email)
            .filter(|u| u.verify_password(password, &self.hasher))
            .ok_or_else(|| AppError::Unauthenticated(BAD_CREDENTIALS.into()))?;
        self.ensure_account_not_suspended(&account)?;
        tracing::info!(user_id = %account.id, "login");
        Ok(account)
    }

    /// Public signup. Always creates a plain `user`; elevated roles are
    /// granted by an admin or through the client signup.
    pub fn signup(&self, body: dto::SignupRequest) -> Result<UserAccount, AppError> {
        self.ensure_email_free(&body.email, None)?;
        let new = NewAccount {
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            email: body.email,
            role: Role::User,
            manager_of: None,
            customer_of: None,
        };
        let account = UserAccount::create(new, &body.password, &self.hasher, Utc::now())?;
        self.store_new_account(account)
    }

    /// Account for a client company (employer or employee). A generated
    /// password is mailed to the user; nothing is stored if the mail fails.
    pub async fn signup_client(&self, body: dto::SignupClientRequest) -> Result<UserAccount, AppError> {
        if !matches!(body.role, Role::Employer | Role::Employee) {
            return Err(AppError::validation("role must be employer or employee"));
        }
        let entity = self.find_entity(body.customer_of)?;
        self.ensure_entity_active(&entity)?;
        self.ensure_email_free(&body.email, None)?;

        let now = Utc::now();
        let password = generate_interim_password(&mut rand::thread_rng());
        let new = NewAccount {
            first_name: capitalize(&body.first_name),
            last_name: capitalize(&body.last_name),
            email: body.email,
            role: body.role,
            manager_of: None,
            customer_of: Some(entity.id),
        };
        let mut account = UserAccount::create(new, &password, &self.hasher, now)?;

        let employee = if body.role == Role::Employee {
            let raw = body
                .matricule
                .as_deref()
                .ok_or_else(|| AppError::validation("An employee account needs a matricule"))?;
            let matricule = Matricule::parse(raw)?;
            let siblings = self.employees.filter(&|e| e.entity == entity.id);
            ensure_unique_matricule(&siblings, &matricule)?;

            let mut employee = Employee::hire(entity.id, &account.first_name, &account.last_name, now)?;
            employee.matricule = Some(matricule);
            employee.user = Some(account.id);
            employee.profile.mail = Some(account.email.clone());
            account.employee_id = Some(employee.id);
            Some(employee)
        } else {
            None
        };

        self.notifier
            .send(
                &account.email,
                &Notification::Welcome {
                    first_name: account.first_name.clone(),
                    password,
                },
            )
            .await?;

        if let Some(employee) = &employee {
            self.store_employee(employee, true)?;
        }
        let account = match self.store_new_account(account) {
            Ok(account) => account,
            Err(err) => {
                if let Some(employee) = &employee {
                    self.employees.remove(&employee.id);
                }
                return Err(err);
            }
        };
        tracing::info!(user_id = %account.id, entity_id = %entity.id, role = %account.role, "client account created");
        Ok(account)
    }

    /// Mail a new interim password. The change is staged on a copy and only
    /// stored once the mail went out.
    pub async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        let account = self
            .find_by_email(email)
            .ok_or_else(|| AppError::not_found(UNKNOWN_EMAIL))?;

        let mut staged = account.clone();
        let secret = staged.issue_reset_secret(&mut rand::thread_rng(), &self.hasher, Utc::now())?;

        self.notifier
            .send(
                &staged.email,
                &Notification::PasswordReset {
                    first_name: staged.first_name.clone(),
                    password: secret,
                },
            )
            .await?;

        // Only the credential fields are written back; the record may have
        // been edited while the mail was in flight.
        let mut applied = false;
        self.users.update(&staged.id, &mut |live| {
            if live.active && live.email == staged.email {
                live.adopt_reset_from(&staged);
                applied = true;
            }
        });
        if !applied {
            tracing::warn!(user_id = %staged.id, "account changed during password reset, reset discarded");
            return Err(AppError::Conflict(ACCOUNT_CHANGED.into()));
        }
        tracing::info!(user_id = %staged.id, "password reset mailed");
        Ok(())
    }

    pub fn change_password(&self, user: &CurrentUser, body: &dto::ChangePasswordRequest) -> Result<UserAccount, AppError> {
        let mut account = self.find_user(user.id())?;
        if !account.verify_password(&body.password_current, &self.hasher) {
            return Err(AppError::Unauthenticated(WRONG_CURRENT_PASSWORD.into()));
        }
        account.set_password(&body.password, &self.hasher, Utc::now())?;
        account.clear_reset_token();
        self.users.upsert(account.id, account.clone());
        tracing::info!(user_id = %account.id, "password changed");
        Ok(account)
    }

    /// First-connection password choice.
    pub fn init_password(&self, user: &CurrentUser, body: &dto::InitPasswordRequest) -> Result<UserAccount, AppError> {
        let mut account = self.find_user(user.id())?;
        account.set_password(&body.password, &self.hasher, Utc::now())?;
        account.clear_reset_token();
        account.first_connection = false;
        self.users.upsert(account.id, account.clone());
        Ok(account)
    }

    pub fn current_account(&self, user: &CurrentUser) -> Result<UserAccount, AppError> {
        let account = self.find_user(user.id())?;
        self.ensure_account_not_suspended(&account)?;
        Ok(account)
    }

    pub fn update_me(&self, user: &CurrentUser, body: dto::UpdateMeRequest) -> Result<UserAccount, AppError> {
        let mut fields = body.0;
        if PASSWORD_FIELDS.iter().any(|f| fields.contains_key(*f)) {
            return Err(AppError::validation(PASSWORD_ROUTE));
        }
        fields.retain(|k, _| matches!(k.as_str(), "firstName" | "lastName" | "email"));
        let update: dto::ProfileUpdate = serde_json::from_value(Value::Object(fields))?;
        validator::Validate::validate(&update)?;

        if let Some(email) = &update.email {
            self.ensure_email_free(email, Some(user.id()))?;
        }
        self.users
            .update(&user.id(), &mut |account| {
                if let Some(v) = &update.first_name {
                    account.first_name = v.trim().to_string();
                }
                if let Some(v) = &update.last_name {
                    account.last_name = v.trim().to_string();
                }
                if let Some(v) = &update.email {
                    account.email = normalize_email(v);
                    account.email_verified = false;
                }
            })
            .ok_or_else(|| AppError::not_found("No user found with that ID"))
    }

    /// Mail a verification code. The token is stored only once the mail
    /// went out.
    pub async fn send_email_verification(&self, user: &CurrentUser) -> Result<(), AppError> {
        let mut staged = self.find_user(user.id())?;
        if staged.email_verified {
            return Err(AppError::Conflict("Email already verified".into()));
        }
        let code = staged.issue_email_verification_secret(&mut rand::thread_rng(), Utc::now());
        self.notifier
            .send(
                &staged.email,
                &Notification::EmailVerification {
                    first_name: staged.first_name.clone(),
                    code,
                },
            )
            .await?;
        let mut applied = false;
        self.users.update(&staged.id, &mut |live| {
            if live.active && live.email == staged.email {
                live.adopt_email_verification_from(&staged);
                applied = true;
            }
        });
        if !applied {
            return Err(AppError::Conflict(ACCOUNT_CHANGED.into()));
        }
        Ok(())
    }

    pub fn verify_email(&self, user: &CurrentUser, code: &str) -> Result<UserAccount, AppError> {
        let mut account = self.find_user(user.id())?;
        account.confirm_email(code, Utc::now())?;
        self.users.upsert(account.id, account.clone());
        Ok(account)
    }

    // ─── Admin directory ────────────────────────────────────────────────

    pub fn list_users(&self) -> Vec<UserAccount> {
        self.users.filter(&|u| u.active)
    }

    pub fn update_user(&self, id: UserId, body: &dto::UpdateUserRequest) -> Result<UserAccount, AppError> {
        self.find_user(id)?;
        if let Some(email) = &body.email {
            self.ensure_email_free(email, Some(id))?;
        }
        if let Some(management) = body.manager_of {
            self.find_management(management)?;
        }
        if let Some(entity) = body.customer_of {
            self.find_entity(entity)?;
        }
        self.users
            .update(&id, &mut |account| {
                if let Some(v) = &body.first_name {
                    account.first_name = v.trim().to_string();
                }
                if let Some(v) = &body.last_name {
                    account.last_name = v.trim().to_string();
                }
                if let Some(v) = &body.email {
                    account.email = normalize_email(v);
                }
                if let Some(role) = body.role {
                    account.role = role;
                }
                if body.manager_of.is_some() {
                    account.manager_of = body.manager_of;
                }
                if body.customer_of.is_some() {
                    account.customer_of = body.customer_of;
                }
                if body.employee_id.is_some() {
                    account.employee_id = body.employee_id;
                }
            })
            .ok_or_else(|| AppError::not_found("No user found with that ID"))
    }

    /// Soft delete.
    pub fn deactivate_user(&self, id: UserId) -> Result<(), AppError> {
        self.find_user(id)?;
        self.users.update(&id, &mut |account| account.active = false);
        tracing::info!(user_id = %id, "user deactivated");
        Ok(())
    }
}

fn duplicate_email(email: &str) -> AppError {
    AppError::validation(format!("Duplicate field value: {email}. Please use another value!"))
}
