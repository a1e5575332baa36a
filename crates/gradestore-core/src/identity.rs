//! Anonymized learner identifiers for the submissions service

use sha1::{Digest, Sha1};

use crate::error::Result;
use crate::keys::CourseKey;
use crate::scores::Student;

/// Maps a student to the per-course anonymous id other services know them by.
pub trait IdentityService {
    fn anonymized_id(&self, student: &Student, course: &CourseKey) -> Result<String>;
}

/// Hex SHA-1 over a shared secret, the course and the user id.
#[derive(Debug, Clone)]
pub struct HashedIdentity {
    secret: String,
}

impl HashedIdentity {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl IdentityService for HashedIdentity {
    fn anonymized_id(&self, student: &Student, course: &CourseKey) -> Result<String> {
        let mut hasher = Sha1::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(course.to_string().as_bytes());
        hasher.update(student.id.to_string().as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymized_id_is_stable_per_course() {
        let identity = HashedIdentity::new("secret");
        let student = Student::new(42, "ada");
        let course = CourseKey::new("Org", "CS101", "2016").unwrap();
        let other = CourseKey::new("Org", "CS102", "2016").unwrap();

        let first = identity.anonymized_id(&student, &course).unwrap();
        assert_eq!(first, identity.anonymized_id(&student, &course).unwrap());
        assert_eq!(first.len(), 40);
        assert_ne!(first, identity.anonymized_id(&student, &other).unwrap());
    }

    #[test]
    fn test_anonymized_id_depends_on_secret() {
        let student = Student::new(42, "ada");
        let course = CourseKey::new("Org", "CS101", "2016").unwrap();
        assert_ne!(
            HashedIdentity::new("a").anonymized_id(&student, &course).unwrap(),
            HashedIdentity::new("b").anonymized_id(&student, &course).unwrap()
        );
    }
}
