use std::fmt;

use crate::{
    constants::{
        EMAIL_MAX_LEN, EMAIL_OFFSET, EMAIL_SIZE, ID_OFFSET, ID_SIZE, ROW_SIZE, USERNAME_MAX_LEN,
        USERNAME_OFFSET, USERNAME_SIZE,
    },
    error::{Error, Result},
};

/// A single record of the table: `(id, username, email)`.
///
/// On disk every row takes exactly [`ROW_SIZE`] bytes: a little-endian id followed by two
/// zero-filled text slots, each with one byte reserved for the terminator. In memory the
/// text columns are plain `String`s which carry their own length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: i32,
    pub username: String,
    pub email: String,
}

impl Row {
    /// Builds a row, rejecting anything [`Row::encode`] would refuse.
    pub fn new<U: Into<String>, E: Into<String>>(id: i32, username: U, email: E) -> Result<Self> {
        let row = Self {
            id,
            username: username.into(),
            email: email.into(),
        };
        row.validate()?;
        Ok(row)
    }

    /// Key the row is stored under.
    pub fn key(&self) -> u32 {
        self.id as u32
    }

    pub fn validate(&self) -> Result<()> {
        if self.id <= 0 {
            return Err(Error::NegativeId {
                id: self.id as i64,
            });
        }
        check_text("username", &self.username, USERNAME_MAX_LEN)?;
        check_text("email", &self.email, EMAIL_MAX_LEN)?;
        Ok(())
    }

    pub fn encode(&self) -> Result<[u8; ROW_SIZE]> {
        self.validate()?;

        let mut buf = [0u8; ROW_SIZE];
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        write_text(&mut buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE], &self.username);
        write_text(&mut buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE], &self.email);
        Ok(buf)
    }

    /// Decodes a block produced by [`Row::encode`]. Business rules are not re-checked.
    pub fn decode(data: &[u8; ROW_SIZE]) -> Self {
        let mut id = [0u8; ID_SIZE];
        id.copy_from_slice(&data[ID_OFFSET..ID_OFFSET + ID_SIZE]);

        Self {
            id: i32::from_le_bytes(id),
            username: read_text(&data[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]),
            email: read_text(&data[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]),
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}

fn check_text(column: &'static str, value: &str, max: usize) -> Result<()> {
    if value.as_bytes().contains(&0) {
        return Err(Error::ContainsNul { column });
    }
    if value.len() > max {
        return Err(Error::StringTooLong {
            column,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

/// Copies the payload into the slot; the rest of the slot, terminator included, stays zero.
fn write_text(slot: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    slot[..bytes.len()].copy_from_slice(bytes);
}

fn read_text(slot: &[u8]) -> String {
    let len = slot.iter().position(|b| *b == 0).unwrap_or(slot.len());
    String::from_utf8_lossy(&slot[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::Row;
    use crate::{
        constants::{EMAIL_OFFSET, ROW_SIZE, USERNAME_OFFSET, USERNAME_SIZE},
        error::Error,
    };

    #[test]
    fn test_serialize() -> anyhow::Result<()> {
        let r = Row::new(1, "elo", "asdasdkpoqkwepoqkwepoqw")?;
        let b1 = r.encode()?;
        let b2 = r.encode()?;

        assert_eq!(b1, b2);
        assert_eq!(b1.len(), ROW_SIZE);
        assert_eq!(&b1[0..4], &1i32.to_le_bytes());
        assert_eq!(&b1[USERNAME_OFFSET..USERNAME_OFFSET + 3], b"elo");
        // unused slot bytes are zero-filled
        assert!(b1[USERNAME_OFFSET + 3..EMAIL_OFFSET].iter().all(|b| *b == 0));

        Ok(())
    }

    #[test]
    fn test_deserialize() -> anyhow::Result<()> {
        let r = Row::new(42, "user42", "person42@example.com")?;
        assert_eq!(r, Row::decode(&r.encode()?));

        let empty = Row::new(7, "", "")?;
        assert_eq!(empty, Row::decode(&empty.encode()?));

        Ok(())
    }

    #[test]
    fn test_max_length_strings() -> anyhow::Result<()> {
        let r = Row::new(i32::MAX, "a".repeat(32), "b".repeat(255))?;
        let bytes = r.encode()?;

        // terminator byte survives even at max length
        assert_eq!(bytes[USERNAME_OFFSET + USERNAME_SIZE - 1], 0);
        assert_eq!(bytes[ROW_SIZE - 1], 0);
        assert_eq!(r, Row::decode(&bytes));

        Ok(())
    }

    #[test]
    fn test_invalid_rows() {
        assert!(matches!(
            Row::new(0, "user", "mail"),
            Err(Error::NegativeId { id: 0 })
        ));
        assert!(matches!(
            Row::new(-1, "user", "mail"),
            Err(Error::NegativeId { id: -1 })
        ));
        assert!(matches!(
            Row::new(1, "a".repeat(33), "mail"),
            Err(Error::StringTooLong {
                column: "username",
                len: 33,
                max: 32
            })
        ));
        assert!(matches!(
            Row::new(1, "user", "a".repeat(256)),
            Err(Error::StringTooLong {
                column: "email",
                ..
            })
        ));

        // rows built by hand are still refused by the codec
        let r = Row {
            id: -5,
            username: "user".to_string(),
            email: "mail".to_string(),
        };
        assert!(r.encode().is_err());
    }

    #[test]
    fn test_nul_bytes_are_rejected() {
        // the terminator would cut the value short on decode
        assert!(matches!(
            Row::new(1, "a\0b", "mail"),
            Err(Error::ContainsNul { column: "username" })
        ));
        assert!(matches!(
            Row::new(1, "user", "x\0y"),
            Err(Error::ContainsNul { column: "email" })
        ));

        let r = Row {
            id: 1,
            username: "ab\0cd".to_string(),
            email: "e@x".to_string(),
        };
        assert!(r.encode().is_err());
    }

    #[test]
    fn test_multibyte_length_is_counted_in_bytes() {
        // 11 three-byte characters: 33 bytes
        let username = "€".repeat(11);
        assert!(Row::new(1, username, "mail").is_err());
    }

    #[test]
    fn test_display() -> anyhow::Result<()> {
        let r = Row::new(1, "user1", "person1@example.com")?;
        assert_eq!(r.to_string(), "(1, user1, person1@example.com)");
        Ok(())
    }
}
