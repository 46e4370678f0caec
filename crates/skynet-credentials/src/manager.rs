use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::{info, instrument};

use crate::crypto::Cipher;
use crate::error::{CredentialError, Result};
use crate::types::Credential;

/// Encrypted credential store. Wraps a SQLite connection in a `Mutex`, the
/// same concurrency model the rest of the workspace's managers use — a
/// single-process, single-writer store is sufficient for this system.
pub struct CredentialStore {
    db: Mutex<Connection>,
    cipher: Cipher,
}

impl CredentialStore {
    pub fn new(conn: Connection, credential_key: &str) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            cipher: Cipher::new(credential_key),
        })
    }

    /// Store (or overwrite) a named secret.
    #[instrument(skip(self, plaintext), fields(name))]
    pub fn put(&self, name: &str, plaintext: &str) -> Result<()> {
        let (ciphertext, nonce) = self.cipher.encrypt(plaintext)?;
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO credentials (name, ciphertext, nonce, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(name) DO UPDATE SET
                ciphertext = excluded.ciphertext,
                nonce = excluded.nonce,
                updated_at = excluded.updated_at",
            params![name, ciphertext, nonce, now],
        )?;
        info!(name, "credential stored");
        Ok(())
    }

    /// Decrypt and return a named secret.
    #[instrument(skip(self), fields(name))]
    pub fn get(&self, name: &str) -> Result<Credential> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                "SELECT ciphertext, nonce, created_at, updated_at FROM credentials WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CredentialError::NotFound {
                    name: name.to_string(),
                },
                other => CredentialError::Database(other),
            })?;
        drop(db);

        let (ciphertext, nonce, created_at, updated_at) = row;
        let plaintext = self.cipher.decrypt(&ciphertext, &nonce)?;

        Ok(Credential {
            name: name.to_string(),
            plaintext,
            created_at,
            updated_at,
        })
    }

    /// True if a credential with this name exists, without decrypting it.
    pub fn exists(&self, name: &str) -> bool {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT 1 FROM credentials WHERE name = ?1",
            params![name],
            |_| Ok(()),
        )
        .is_ok()
    }

    /// List known credential names (never plaintext values).
    pub fn list_names(&self) -> Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT name FROM credentials ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(names)
    }

    #[instrument(skip(self), fields(name))]
    pub fn delete(&self, name: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM credentials WHERE name = ?1", params![name])?;
        if n == 0 {
            return Err(CredentialError::NotFound {
                name: name.to_string(),
            });
        }
        info!(name, "credential deleted");
        Ok(())
    }

    /// Re-encrypt every credential under a new key, inside one transaction.
    /// Used for key rotation.
    pub fn rotate_key(&mut self, new_credential_key: &str) -> Result<()> {
        let new_cipher = Cipher::new(new_credential_key);
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let rows: Vec<(String, Vec<u8>, Vec<u8>)> = {
            let mut stmt = tx.prepare("SELECT name, ciphertext, nonce FROM credentials")?;
            stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .collect()
        };

        for (name, ciphertext, nonce) in rows {
            let plaintext = self.cipher.decrypt(&ciphertext, &nonce)?;
            let (new_ct, new_nonce) = new_cipher.encrypt(&plaintext)?;
            tx.execute(
                "UPDATE credentials SET ciphertext = ?1, nonce = ?2 WHERE name = ?3",
                params![new_ct, new_nonce, name],
            )?;
        }
        tx.commit()?;
        drop(db);
        self.cipher = new_cipher;
        info!("credential store key rotated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        let conn = Connection::open_in_memory().unwrap();
        CredentialStore::new(conn, "test-key").unwrap()
    }

    #[test]
    fn put_then_get_roundtrips_plaintext() {
        let store = store();
        store.put("gmail_api_key", "sk-abc123").unwrap();
        let cred = store.get("gmail_api_key").unwrap();
        assert_eq!(cred.plaintext, "sk-abc123");
    }

    #[test]
    fn get_missing_returns_not_found() {
        let store = store();
        assert!(matches!(
            store.get("missing"),
            Err(CredentialError::NotFound { .. })
        ));
    }

    #[test]
    fn rotate_key_preserves_plaintext() {
        let mut store = store();
        store.put("secret", "value-1").unwrap();
        store.rotate_key("new-key").unwrap();
        assert_eq!(store.get("secret").unwrap().plaintext, "value-1");
    }
}
