//! The single validator trust root.
//!
//! Exactly one identity may finalize fills. Rotation is self-administered:
//! only the incumbent can hand the role to someone else, and never to the
//! null identity. There is no owner or admin above the validator.

use tracing::info;

use crate::error::{AuthorizationError, ValidationError};
use crate::types::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorRegistry {
    current: Identity,
}

impl ValidatorRegistry {
    pub fn new(initial: Identity) -> Result<Self, ValidationError> {
        if initial.is_null() {
            return Err(ValidationError::NullValidator);
        }
        Ok(Self { current: initial })
    }

    #[inline]
    pub fn current(&self) -> Identity {
        self.current
    }

    #[inline]
    pub fn is_validator(&self, who: Identity) -> bool {
        who == self.current
    }

    pub fn ensure_validator(&self, caller: Identity) -> Result<(), AuthorizationError> {
        if self.is_validator(caller) {
            Ok(())
        } else {
            Err(AuthorizationError::NotValidator {
                caller,
                validator: self.current,
            })
        }
    }

    /// Hand the role to `next`. Returns the previous validator.
    ///
    /// Authorization is checked before the null check, so a non-validator
    /// always sees an authorization error.
    pub fn rotate(&mut self, caller: Identity, next: Identity) -> crate::Result<Identity> {
        self.ensure_validator(caller)?;
        if next.is_null() {
            return Err(ValidationError::NullValidator.into());
        }

        let previous = std::mem::replace(&mut self.current, next);
        info!(%previous, current = %next, "validator rotated");
        Ok(previous)
    }
}
