//! Record kinds and their field-encryption tables
//!
//! Every kind lists its fields once, in `fields_mut`, each flagged
//! sensitive or plain. Encryption, decryption and the cache's column
//! mapping all walk that one table.

use keeper_crypto::{Cipher, CipherError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// The four kinds of secrets, in sync order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Binary,
    Card,
    Credential,
    Text,
}

impl RecordKind {
    /// Reconciliation order
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Binary,
        RecordKind::Card,
        RecordKind::Credential,
        RecordKind::Text,
    ];

    /// Human-readable plural, used in logs and errors
    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Binary => "binaries",
            RecordKind::Card => "cards",
            RecordKind::Credential => "credentials",
            RecordKind::Text => "text data",
        }
    }

    /// Local cache table
    pub fn table(self) -> &'static str {
        match self {
            RecordKind::Binary => "binaries",
            RecordKind::Card => "cards",
            RecordKind::Credential => "credentials",
            RecordKind::Text => "text_data",
        }
    }

    /// Remote API path segment
    pub fn route(self) -> &'static str {
        match self {
            RecordKind::Binary => "binary",
            RecordKind::Card => "card",
            RecordKind::Credential => "credentials",
            RecordKind::Text => "text",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a field is ciphertext at rest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    Sensitive,
    Plain,
}

/// Mutable view of one field's storage
pub enum FieldMut<'a> {
    Text(&'a mut String),
    Bytes(&'a mut Vec<u8>),
}

/// One entry of a kind's field table
pub struct Field<'a> {
    pub name: &'static str,
    pub sensitivity: Sensitivity,
    pub value: FieldMut<'a>,
}

impl<'a> Field<'a> {
    pub fn sensitive(name: &'static str, value: FieldMut<'a>) -> Self {
        Self {
            name,
            sensitivity: Sensitivity::Sensitive,
            value,
        }
    }

    pub fn plain(name: &'static str, value: FieldMut<'a>) -> Self {
        Self {
            name,
            sensitivity: Sensitivity::Plain,
            value,
        }
    }
}

/// Common contract of every stored secret.
///
/// `id` is assigned by the remote store, never encrypted, and never part
/// of the field table.
pub trait SecureRecord:
    Clone + Default + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: RecordKind;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// The field table: every field except `id`, with its sensitivity
    fn fields_mut(&mut self) -> Vec<Field<'_>>;

    /// Column names, in table order
    fn field_names() -> Vec<&'static str> {
        let mut blank = Self::default();
        let names = blank.fields_mut().iter().map(|field| field.name).collect();
        names
    }

    /// Replace every non-empty sensitive field with its ciphertext.
    ///
    /// All-or-nothing: on error the record is left untouched.
    fn encrypt_fields(&mut self, cipher: &Cipher) -> Result<(), CipherError> {
        let mut sealed = self.clone();
        for field in sealed.fields_mut() {
            if field.sensitivity == Sensitivity::Plain {
                continue;
            }
            match field.value {
                FieldMut::Text(value) if !value.is_empty() => {
                    *value = cipher.encrypt(value.as_str())?;
                }
                FieldMut::Bytes(value) if !value.is_empty() => {
                    *value = cipher.encrypt_bytes(value.as_slice())?;
                }
                _ => {}
            }
        }
        *self = sealed;
        Ok(())
    }

    /// Inverse of [`SecureRecord::encrypt_fields`]. Empty fields stay empty.
    fn decrypt_fields(&mut self, cipher: &Cipher) -> Result<(), CipherError> {
        let mut opened = self.clone();
        for field in opened.fields_mut() {
            if field.sensitivity == Sensitivity::Plain {
                continue;
            }
            match field.value {
                FieldMut::Text(value) if !value.is_empty() => {
                    *value = cipher.decrypt(value.as_str())?;
                }
                FieldMut::Bytes(value) if !value.is_empty() => {
                    *value = cipher.decrypt_bytes(value.as_slice())?;
                }
                _ => {}
            }
        }
        *self = opened;
        Ok(())
    }
}

/// Arbitrary binary payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default, with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl BinaryRecord {
    pub fn new(metadata: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: String::new(),
            metadata: metadata.into(),
            data,
        }
    }
}

impl SecureRecord for BinaryRecord {
    const KIND: RecordKind = RecordKind::Binary;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn fields_mut(&mut self) -> Vec<Field<'_>> {
        vec![
            Field::sensitive("metadata", FieldMut::Text(&mut self.metadata)),
            Field::sensitive("data", FieldMut::Bytes(&mut self.data)),
        ]
    }
}

/// Bank card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub holder: String,
    #[serde(default)]
    pub expiration: String,
    #[serde(default)]
    pub cvv: String,
}

impl SecureRecord for CardRecord {
    const KIND: RecordKind = RecordKind::Card;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn fields_mut(&mut self) -> Vec<Field<'_>> {
        vec![
            Field::sensitive("metadata", FieldMut::Text(&mut self.metadata)),
            Field::sensitive("number", FieldMut::Text(&mut self.number)),
            Field::sensitive("holder", FieldMut::Text(&mut self.holder)),
            Field::sensitive("expiration", FieldMut::Text(&mut self.expiration)),
            Field::sensitive("cvv", FieldMut::Text(&mut self.cvv)),
        ]
    }
}

/// Login/password pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

impl CredentialRecord {
    pub fn new(
        metadata: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            metadata: metadata.into(),
            login: login.into(),
            password: password.into(),
        }
    }
}

impl SecureRecord for CredentialRecord {
    const KIND: RecordKind = RecordKind::Credential;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    // login/password are stored as plaintext on both sides. Flip them to
    // `Field::sensitive` only together with a server-side migration.
    fn fields_mut(&mut self) -> Vec<Field<'_>> {
        vec![
            Field::sensitive("metadata", FieldMut::Text(&mut self.metadata)),
            Field::plain("login", FieldMut::Text(&mut self.login)),
            Field::plain("password", FieldMut::Text(&mut self.password)),
        ]
    }
}

/// Free-form text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub data: String,
}

impl TextRecord {
    pub fn new(metadata: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            metadata: metadata.into(),
            data: data.into(),
        }
    }
}

impl SecureRecord for TextRecord {
    const KIND: RecordKind = RecordKind::Text;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn fields_mut(&mut self) -> Vec<Field<'_>> {
        vec![
            Field::sensitive("metadata", FieldMut::Text(&mut self.metadata)),
            Field::sensitive("data", FieldMut::Text(&mut self.data)),
        ]
    }
}

/// Binary payloads travel as base64 strings in JSON
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeper_crypto::MasterKey;
    use secrecy::SecretString;

    fn cipher(password: &str) -> Cipher {
        Cipher::new(MasterKey::derive(&SecretString::new(password.to_string())))
    }

    fn card() -> CardRecord {
        CardRecord {
            id: "c-1".into(),
            metadata: "work visa".into(),
            number: "4111111111111111".into(),
            holder: "J DOE".into(),
            expiration: "12/29".into(),
            cvv: "123".into(),
        }
    }

    #[test]
    fn test_card_roundtrip_encrypts_every_field() {
        let c = cipher("pw1");
        let original = card();

        let mut sealed = original.clone();
        sealed.encrypt_fields(&c).unwrap();

        assert_eq!(sealed.id, "c-1");
        assert_ne!(sealed.metadata, original.metadata);
        assert_ne!(sealed.number, original.number);
        assert_ne!(sealed.holder, original.holder);
        assert_ne!(sealed.expiration, original.expiration);
        assert_ne!(sealed.cvv, original.cvv);

        sealed.decrypt_fields(&c).unwrap();
        assert_eq!(sealed, original);
    }

    #[test]
    fn test_binary_roundtrip() {
        let c = cipher("pw1");
        let original = BinaryRecord {
            id: "b-1".into(),
            metadata: "key file".into(),
            data: vec![0, 1, 2, 254, 255],
        };

        let mut sealed = original.clone();
        sealed.encrypt_fields(&c).unwrap();
        assert_ne!(sealed.data, original.data);
        assert_ne!(sealed.metadata, original.metadata);

        sealed.decrypt_fields(&c).unwrap();
        assert_eq!(sealed, original);
    }

    #[test]
    fn test_credential_only_metadata_is_sealed() {
        let c = cipher("pw1");
        let original = CredentialRecord::new("mail", "alice", "hunter2");

        let mut sealed = original.clone();
        sealed.encrypt_fields(&c).unwrap();

        assert_ne!(sealed.metadata, "mail");
        assert_eq!(sealed.login, "alice");
        assert_eq!(sealed.password, "hunter2");

        sealed.decrypt_fields(&c).unwrap();
        assert_eq!(sealed, original);
    }

    #[test]
    fn test_empty_fields_are_skipped() {
        let c = cipher("pw1");
        let mut text = TextRecord::new("", "secret");

        text.encrypt_fields(&c).unwrap();
        assert!(text.metadata.is_empty());
        assert_ne!(text.data, "secret");

        text.decrypt_fields(&c).unwrap();
        assert_eq!(text, TextRecord::new("", "secret"));

        let mut empty = BinaryRecord::default();
        empty.encrypt_fields(&c).unwrap();
        assert_eq!(empty, BinaryRecord::default());
    }

    #[test]
    fn test_failed_decrypt_leaves_record_untouched() {
        let mut sealed = TextRecord::new("note", "secret");
        sealed.encrypt_fields(&cipher("pw1")).unwrap();
        let before = sealed.clone();

        let err = sealed.decrypt_fields(&cipher("pw2")).unwrap_err();
        assert_eq!(err, CipherError::AuthenticationFailed);
        assert_eq!(sealed, before);
    }

    #[test]
    fn test_field_names_follow_table_order() {
        assert_eq!(BinaryRecord::field_names(), vec!["metadata", "data"]);
        assert_eq!(
            CardRecord::field_names(),
            vec!["metadata", "number", "holder", "expiration", "cvv"]
        );
        assert_eq!(CredentialRecord::field_names(), vec!["metadata", "login", "password"]);
        assert_eq!(TextRecord::field_names(), vec!["metadata", "data"]);
    }

    #[test]
    fn test_binary_json_uses_base64() {
        let record = BinaryRecord {
            id: "b-1".into(),
            metadata: "m".into(),
            data: b"hi".to_vec(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["data"], "aGk=");

        let back: BinaryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(RecordKind::Text.to_string(), "text data");
        assert_eq!(RecordKind::Credential.table(), "credentials");
        assert_eq!(RecordKind::Binary.route(), "binary");
    }
}
