//! Message catalog. Every notification the system sends, and how it reads.

use chrono::NaiveDate;
use serde::Serialize;

use super::Attachment;

const FOOTER: &str = "<br/><br/>Ceci est un message automatique, merci de ne pas y répondre.";

/// Absence facts shown in every absence-related message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceDetails {
    pub employee_name: String,
    pub matricule: String,
    pub code: String,
    pub name: String,
    pub begin: NaiveDate,
    pub end: NaiveDate,
    pub documents: Vec<String>,
}

/// One salary element as entered by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryLine {
    pub employee_name: String,
    pub matricule: String,
    pub code: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Welcome {
        first_name: String,
        password: String,
    },
    PasswordReset {
        first_name: String,
        password: String,
    },
    EmailVerification {
        first_name: String,
        code: String,
    },
    NewEmployee {
        entity_name: String,
        employee_name: String,
        documents: Vec<String>,
    },
    EmployeeDeparture {
        entity_name: String,
        employee_name: String,
        matricule: Option<String>,
        departure_type: String,
        departure_date: NaiveDate,
    },
    AbsenceDeclared {
        entity_name: String,
        details: AbsenceDetails,
    },
    AbsenceRequestSubmitted {
        entity_name: String,
        details: AbsenceDetails,
    },
    AbsenceRequestReceived {
        entity_name: String,
        first_name: String,
    },
    AbsenceValidated {
        entity_name: String,
        details: AbsenceDetails,
    },
    AbsenceRequestApproved {
        entity_name: String,
        details: AbsenceDetails,
    },
    AbsenceRequestRejected {
        entity_name: String,
        details: AbsenceDetails,
    },
    SalaryElements {
        entity_name: String,
        lines: Vec<SalaryLine>,
    },
    SalaryValidation {
        entity_name: String,
        message: String,
    },
    AdvanceRequested {
        entity_name: String,
        employee_name: String,
        amount: f64,
        reason: String,
    },
    PayslipBatch {
        entity_name: String,
        absences_csv: String,
        primes_csv: String,
    },
    WebsiteContact {
        name: String,
        email: String,
        phone: Option<String>,
        message: String,
    },
    EntityMessage {
        entity_name: String,
        message: String,
        documents: Vec<String>,
    },
}

/// Subject, HTML body and attachments of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

impl Notification {
    /// Short stable name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "welcome",
            Notification::PasswordReset { .. } => "password_reset",
            Notification::EmailVerification { .. } => "email_verification",
            Notification::NewEmployee { .. } => "new_employee",
            Notification::EmployeeDeparture { .. } => "employee_departure",
            Notification::AbsenceDeclared { .. } => "absence_declared",
            Notification::AbsenceRequestSubmitted { .. } => "absence_request_submitted",
            Notification::AbsenceRequestReceived { .. } => "absence_request_received",
            Notification::AbsenceValidated { .. } => "absence_validated",
            Notification::AbsenceRequestApproved { .. } => "absence_request_approved",
            Notification::AbsenceRequestRejected { .. } => "absence_request_rejected",
            Notification::SalaryElements { .. } => "salary_elements",
            Notification::SalaryValidation { .. } => "salary_validation",
            Notification::AdvanceRequested { .. } => "advance_requested",
            Notification::PayslipBatch { .. } => "payslip_batch",
            Notification::WebsiteContact { .. } => "website_contact",
            Notification::EntityMessage { .. } => "entity_message",
        }
    }

    pub fn render(&self) -> Rendered {
        let mut attachments = Vec::new();
        let (subject, html) = match self {
            Notification::Welcome { first_name, password } => (
                "Votre nouveau mot de passe Easy-Paies".to_string(),
                format!(
                    "Bonjour {first_name},<br><br>Bienvenue sur Easy Paies !<br><br>\
                     Vous pouvez vous connecter dès à présent avec votre adresse email et le mot de passe suivant :\
                     <br><br>{password}<br><br>\
                     Lors de votre première connexion, il vous sera demandé de modifier votre mot de passe.\
                     <br><br>A bientôt sur Easy Paies."
                ),
            ),
            Notification::PasswordReset { first_name, password } => (
                "Votre nouveau mot de passe Easy-Paies".to_string(),
                format!(
                    "Bonjour {first_name},<br><br>Voici votre nouveau mot de passe Easy-Paies : {password}\
                     <br><br>Vous pourrez le modifier depuis votre compte."
                ),
            ),
            Notification::EmailVerification { first_name, code } => (
                "Vérification de votre adresse email Easy-Paies".to_string(),
                format!(
                    "Bonjour {first_name},<br><br>Votre code de vérification est : {code}\
                     <br><br>Il est valable 10 minutes.{FOOTER}"
                ),
            ),
            Notification::NewEmployee {
                entity_name,
                employee_name,
                documents,
            } => (
                format!("Nouvelle fiche employé pour {entity_name}"),
                format!(
                    "Bonjour,<br/><br/>Une nouvelle fiche employé a été saisie pour {entity_name}.\
                     <br/><br/>Employé : {employee_name}{}{FOOTER}",
                    documents_block(documents)
                ),
            ),
            Notification::EmployeeDeparture {
                entity_name,
                employee_name,
                matricule,
                departure_type,
                departure_date,
            } => (
                format!("Nouveau départ employé pour {entity_name}"),
                format!(
                    "Bonjour,<br/><br/>Un départ employé a été saisi pour {entity_name}.\
                     <br/><br/>Employé : {employee_name}<br/>Matricule : {}\
                     <br/>Type de départ : {departure_type}<br/>Date de départ : {}{FOOTER}",
                    matricule.as_deref().unwrap_or("-"),
                    french_day(*departure_date)
                ),
            ),
            Notification::AbsenceDeclared { entity_name, details } => (
                format!("Nouvelle absence pour {entity_name}"),
                format!(
                    "Bonjour,<br/><br/>Une nouvelle absence employé a été saisie pour {entity_name}.\
                     <br/><br/>Voici les informations :{}{FOOTER}",
                    absence_block(details)
                ),
            ),
            Notification::AbsenceRequestSubmitted { entity_name, details } => (
                format!("Nouvelle demande d'absence pour {entity_name}"),
                format!(
                    "Bonjour,<br/><br/>Une nouvelle demande d'absence a été soumise pour {entity_name}.\
                     <br/><br/>Voici les informations :{}{FOOTER}",
                    absence_block(details)
                ),
            ),
            Notification::AbsenceRequestReceived { entity_name, first_name } => (
                format!("Votre demande d'absence pour {entity_name} a bien été prise en compte"),
                format!(
                    "Bonjour {first_name},<br/><br/>Votre demande d'absence a bien été prise en compte.\
                     <br/><br/>Vous recevrez une notification dès que votre employeur aura traité votre demande.{FOOTER}"
                ),
            ),
            Notification::AbsenceValidated { entity_name, details } => (
                format!("Nouvelle absence validée pour {entity_name}"),
                format!(
                    "Bonjour,<br/><br/>Une nouvelle absence employé a été validée pour {entity_name}.\
                     <br/><br/>Voici les informations :{}{FOOTER}",
                    absence_block(details)
                ),
            ),
            Notification::AbsenceRequestApproved { entity_name, details } => (
                format!("Votre demande d'absence pour {entity_name} a été acceptée"),
                format!(
                    "Bonjour {},<br/><br/>Votre demande d'absence pour {entity_name} a été acceptée.\
                     <br/><br/>Voici les informations :{}\
                     <br/><br/>Pour plus d'informations, merci de prendre contact avec votre employeur.{FOOTER}",
                    details.employee_name,
                    absence_block(details)
                ),
            ),
            Notification::AbsenceRequestRejected { entity_name, details } => (
                format!("Rejet de votre demande d'absence pour {entity_name}"),
                format!(
                    "Bonjour {},<br/><br/>Votre demande d'absence pour {entity_name} a été rejetée.\
                     <br/><br/>Voici les informations :{}\
                     <br/><br/>Pour plus d'informations, merci de prendre contact avec votre employeur.{FOOTER}",
                    details.employee_name,
                    absence_block(details)
                ),
            ),
            Notification::SalaryElements { entity_name, lines } => {
                let body: String = lines
                    .iter()
                    .map(|l| {
                        format!(
                            "<br/><br/> - {} matricule : {}<br/>   code : {}, valeur : {}",
                            l.employee_name, l.matricule, l.code, l.value
                        )
                    })
                    .collect();
                (
                    format!("Validation de salaire pour {entity_name}"),
                    format!(
                        "Bonjour,<br/><br/>Une nouvelle validation de salaire a été saisie pour {entity_name}.\
                         <br/><br/>Voici les informations :{body}{FOOTER}"
                    ),
                )
            }
            Notification::SalaryValidation { entity_name, message } => (
                format!("Validation de salaire pour {entity_name}"),
                format!(
                    "Bonjour,<br/><br/>Les salaires de {entity_name} ont été validés.\
                     <br/><br/>{message}{FOOTER}"
                ),
            ),
            Notification::AdvanceRequested {
                entity_name,
                employee_name,
                amount,
                reason,
            } => (
                format!("Demande d'acompte pour {entity_name}"),
                format!(
                    "Bonjour,<br/><br/>Une demande d'acompte a été saisie pour {entity_name}.\
                     <br/><br/>Employé : {employee_name}<br/>Montant : {amount}<br/>Motif : {reason}{FOOTER}"
                ),
            ),
            Notification::PayslipBatch {
                entity_name,
                absences_csv,
                primes_csv,
            } => {
                attachments.push(Attachment::csv("absences.csv", absences_csv.clone()));
                attachments.push(Attachment::csv("primes.csv", primes_csv.clone()));
                (
                    format!("{entity_name} - Validation génération bulletin"),
                    format!(
                        "Bonjour,<br/><br/>{entity_name} a validé la génération des bulletins.\
                         <br/><br/>Vous trouverez en pièces jointes les absences et les primes de la période.{FOOTER}"
                    ),
                )
            }
            Notification::WebsiteContact {
                name,
                email,
                phone,
                message,
            } => (
                "Nouveau message depuis easy-paies.fr".to_string(),
                format!(
                    "Nom : {name}<br/>Email : {email}<br/>Téléphone : {}<br/><br/>{message}",
                    phone.as_deref().unwrap_or("-")
                ),
            ),
            Notification::EntityMessage {
                entity_name,
                message,
                documents,
            } => (
                format!("Nouveau message de {entity_name}"),
                format!(
                    "Bonjour,<br/><br/>Un nouveau message de {entity_name} vient d'être envoyé.\
                     <br/><br/>Voici le message :<br/><br/>{message}{}{FOOTER}",
                    documents_block(documents)
                ),
            ),
        };

        Rendered {
            subject,
            html,
            attachments,
        }
    }
}

fn french_day(day: NaiveDate) -> String {
    day.format("%d/%m/%Y").to_string()
}

fn documents_block(documents: &[String]) -> String {
    if documents.is_empty() {
        return String::new();
    }
    let links: Vec<String> = documents.iter().map(|d| format!("<a href=\"{d}\">{d}</a>")).collect();
    format!("<br/>Documents : {}", links.join(", "))
}

fn absence_block(d: &AbsenceDetails) -> String {
    format!(
        "<br/><br/>Employé : {}<br/>Matricule : {}<br/>Code d'absence : {}<br/>Type d'absence : {}\
         <br/>Date de début : {}<br/>Date de fin : {}{}",
        d.employee_name,
        d.matricule,
        d.code,
        d.name,
        french_day(d.begin),
        french_day(d.end),
        documents_block(&d.documents)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payslip_batch_carries_both_files() {
        let rendered = Notification::PayslipBatch {
            entity_name: "Boulangerie".into(),
            absences_csv: "Matricule;Code;Valeur;Date début;Date fin\n".into(),
            primes_csv: "Matricule;P1\nA;150\n".into(),
        }
        .render();

        assert_eq!(rendered.subject, "Boulangerie - Validation génération bulletin");
        let names: Vec<_> = rendered.attachments.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, ["absences.csv", "primes.csv"]);
        assert_eq!(rendered.attachments[1].content, b"Matricule;P1\nA;150\n");
    }

    #[test]
    fn absence_messages_use_french_dates() {
        let details = AbsenceDetails {
            employee_name: "Lea Martin".into(),
            matricule: "M01".into(),
            code: "CP".into(),
            name: "Congés payés".into(),
            begin: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            documents: vec!["https://docs.example/a.pdf".into()],
        };
        let rendered = Notification::AbsenceRequestRejected {
            entity_name: "Boulangerie".into(),
            details,
        }
        .render();

        assert_eq!(rendered.subject, "Rejet de votre demande d'absence pour Boulangerie");
        assert!(rendered.html.contains("04/03/2024"));
        assert!(rendered.html.contains("href=\"https://docs.example/a.pdf\""));
        assert!(rendered.attachments.is_empty());
    }

    #[test]
    fn reset_mail_contains_the_secret() {
        let rendered = Notification::PasswordReset {
            first_name: "Ada".into(),
            password: "Secr3tPassw0".into(),
        }
        .render();
        assert!(rendered.html.contains("Secr3tPassw0"));
        assert_eq!(rendered.subject, "Votre nouveau mot de passe Easy-Paies");
    }
}
