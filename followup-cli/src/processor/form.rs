//! Follow-up form contents

use chrono::Datelike;

use crate::ui::FollowUpForm;

/// Upper-case Portuguese month names, January first
pub const MONTHS_PT: [&str; 12] = [
    "JANEIRO",
    "FEVEREIRO",
    "MARÇO",
    "ABRIL",
    "MAIO",
    "JUNHO",
    "JULHO",
    "AGOSTO",
    "SETEMBRO",
    "OUTUBRO",
    "NOVEMBRO",
    "DEZEMBRO",
];

pub const DEFAULT_CHANNEL: &str = "WhatsApp";
pub const DEFAULT_APPOINTMENT_TYPE: &str = "Cobrança";
pub const DEFAULT_INTEREST_LEVEL: &str = "Muito Interessado";
pub const DEFAULT_SUBJECT_PREFIX: &str = "COBRANÇA PARCELA";

/// Month name for a 1-based month number
pub fn month_name(month: u32) -> Option<&'static str> {
    let idx = usize::try_from(month).ok()?.checked_sub(1)?;
    MONTHS_PT.get(idx).copied()
}

/// `"<PREFIX> - <MONTH>"`
pub fn compose_subject(prefix: &str, month: u32) -> String {
    let prefix = prefix.trim();
    match month_name(month) {
        Some(name) => format!("{} - {}", prefix, name),
        None => prefix.to_string(),
    }
}

/// Fixed choices entered into every follow-up of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpSettings {
    pub channel: String,
    pub appointment_type: String,
    pub interest_level: String,
    pub subject_prefix: String,
    pub submit: bool,
}

impl Default for FollowUpSettings {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            appointment_type: DEFAULT_APPOINTMENT_TYPE.to_string(),
            interest_level: DEFAULT_INTEREST_LEVEL.to_string(),
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            submit: true,
        }
    }
}

impl FollowUpSettings {
    /// Form for `agent`, with the subject naming `month`
    pub fn form_for(&self, agent: &str, month: u32) -> FollowUpForm {
        FollowUpForm {
            agent: agent.trim().to_string(),
            channel: self.channel.clone(),
            appointment_type: self.appointment_type.clone(),
            interest_level: self.interest_level.clone(),
            subject: compose_subject(&self.subject_prefix, month),
            submit: self.submit,
        }
    }

    /// Form for `agent` using the current local month
    pub fn current_form(&self, agent: &str) -> FollowUpForm {
        self.form_for(agent, chrono::Local::now().month())
    }
}
