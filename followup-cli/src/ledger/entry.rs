//! Ledger entry: a snapshot of a processed row

use crate::sheet::normalize::normalize_tax_id;
use crate::sheet::{KeyColumnKind, ResolvedKey, Row};

/// Column names of the ledger workbook, in order
pub mod cols {
    pub const KEY: &str = "key";
    pub const FULL_NAME: &str = "nome_completo";
    pub const TAX_ID: &str = "cpf";
    pub const EMAIL: &str = "email";
    pub const BIRTH_DATE: &str = "data_nascimento";
    pub const POSTAL_CODE: &str = "cep";
    pub const STREET: &str = "logradouro";
    pub const NUMBER: &str = "numero";
    pub const DISTRICT: &str = "bairro";
    pub const PHONE: &str = "telefone";
    pub const REASON: &str = "reason";

    /// The nine snapshot fields, in file order
    pub const SNAPSHOT: [&str; 9] = [
        FULL_NAME,
        TAX_ID,
        EMAIL,
        BIRTH_DATE,
        POSTAL_CODE,
        STREET,
        NUMBER,
        DISTRICT,
        PHONE,
    ];

    /// Full header: key, the nine snapshot fields, reason
    pub const ALL: [&str; 11] = [
        KEY,
        FULL_NAME,
        TAX_ID,
        EMAIL,
        BIRTH_DATE,
        POSTAL_CODE,
        STREET,
        NUMBER,
        DISTRICT,
        PHONE,
        REASON,
    ];
}

/// Alternative input column names accepted when snapshotting a row
fn aliases(field: &str) -> &'static [&'static str] {
    match field {
        cols::FULL_NAME => &["nome_completo", "nome", "aluno"],
        cols::TAX_ID => &["cpf"],
        cols::EMAIL => &["email", "e-mail"],
        cols::BIRTH_DATE => &["data_nascimento", "nascimento"],
        cols::POSTAL_CODE => &["cep"],
        cols::STREET => &["logradouro", "endereco", "endereço"],
        cols::NUMBER => &["numero", "número"],
        cols::DISTRICT => &["bairro"],
        cols::PHONE => &["telefone", "celular"],
        _ => &[],
    }
}

/// One processed row as recorded in a ledger
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LedgerEntry {
    pub key: Option<ResolvedKey>,
    pub full_name: String,
    pub tax_id: String,
    pub email: String,
    pub birth_date: String,
    pub postal_code: String,
    pub street: String,
    pub number: String,
    pub district: String,
    pub phone: String,
    /// Why the row failed; empty for succeeded rows
    pub reason: Option<String>,
}

impl LedgerEntry {
    /// Snapshot a row's fields under its normalized key
    pub fn from_row(row: &Row, key: &ResolvedKey, kind: KeyColumnKind) -> Self {
        let mut entry = LedgerEntry {
            key: Some(key.clone()),
            ..LedgerEntry::default()
        };
        for field in cols::SNAPSHOT {
            if let Some(value) = lookup(row, field) {
                entry.set(field, value.trim().to_string());
            }
        }
        if entry.tax_id.is_empty() && kind == KeyColumnKind::NaturalKey {
            entry.tax_id = key.as_str().to_string();
        }
        if entry.full_name.is_empty() && kind == KeyColumnKind::Name {
            entry.full_name = key.as_str().to_string();
        }
        entry
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Key used for dedup: the stored key, else the digits of the tax ID
    pub fn dedup_key(&self) -> Option<ResolvedKey> {
        if let Some(key) = &self.key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        let digits = normalize_tax_id(&self.tax_id);
        if digits.is_empty() {
            None
        } else {
            Some(ResolvedKey::from_normalized(digits))
        }
    }

    pub fn get(&self, column: &str) -> &str {
        match column {
            cols::KEY => self.key.as_ref().map(|k| k.as_str()).unwrap_or(""),
            cols::FULL_NAME => &self.full_name,
            cols::TAX_ID => &self.tax_id,
            cols::EMAIL => &self.email,
            cols::BIRTH_DATE => &self.birth_date,
            cols::POSTAL_CODE => &self.postal_code,
            cols::STREET => &self.street,
            cols::NUMBER => &self.number,
            cols::DISTRICT => &self.district,
            cols::PHONE => &self.phone,
            cols::REASON => self.reason.as_deref().unwrap_or(""),
            _ => "",
        }
    }

    pub fn set(&mut self, column: &str, value: String) {
        match column {
            cols::KEY => {
                self.key = (!value.trim().is_empty())
                    .then(|| ResolvedKey::from_normalized(value.trim()))
            }
            cols::FULL_NAME => self.full_name = value,
            cols::TAX_ID => self.tax_id = value,
            cols::EMAIL => self.email = value,
            cols::BIRTH_DATE => self.birth_date = value,
            cols::POSTAL_CODE => self.postal_code = value,
            cols::STREET => self.street = value,
            cols::NUMBER => self.number = value,
            cols::DISTRICT => self.district = value,
            cols::PHONE => self.phone = value,
            cols::REASON => self.reason = (!value.is_empty()).then_some(value),
            _ => {}
        }
    }
}

fn lookup<'a>(row: &'a Row, field: &str) -> Option<&'a str> {
    for alias in aliases(field) {
        let found = row
            .iter()
            .find(|(column, _)| column.trim().to_lowercase() == *alias)
            .map(|(_, value)| value);
        if found.is_some() {
            return found;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Sheet;

    #[test]
    fn test_snapshot_matches_columns_case_insensitively() {
        let sheet = Sheet::from_records(
            "s",
            vec!["CPF".into(), "Nome".into(), "Telefone".into(), "extra".into()],
            vec![vec![
                "123.456.789-00".into(),
                "Ana Lima".into(),
                "85 99999-0000".into(),
                "ignored".into(),
            ]],
        );
        let row = &sheet.rows()[0];
        let key = KeyColumnKind::NaturalKey.normalize("123.456.789-00");

        let entry = LedgerEntry::from_row(row, &key, KeyColumnKind::NaturalKey);
        assert_eq!(entry.key.as_ref().map(|k| k.as_str()), Some("12345678900"));
        assert_eq!(entry.tax_id, "123.456.789-00");
        assert_eq!(entry.full_name, "Ana Lima");
        assert_eq!(entry.phone, "85 99999-0000");
        assert_eq!(entry.email, "");
    }

    #[test]
    fn test_snapshot_fills_tax_id_from_key() {
        let sheet = Sheet::from_records("s", vec!["doc".into()], vec![vec!["111.222.333-44".into()]]);
        let key = KeyColumnKind::NaturalKey.normalize("111.222.333-44");

        let entry = LedgerEntry::from_row(&sheet.rows()[0], &key, KeyColumnKind::NaturalKey);
        assert_eq!(entry.tax_id, "11122233344");
    }

    #[test]
    fn test_dedup_key_falls_back_to_tax_id() {
        let entry = LedgerEntry {
            tax_id: "123.456.789-00".into(),
            ..LedgerEntry::default()
        };
        assert_eq!(
            entry.dedup_key().map(|k| k.as_str().to_string()),
            Some("12345678900".to_string())
        );
        assert_eq!(LedgerEntry::default().dedup_key(), None);
    }
}
