//! Record validation: structural checks applied before a record is persisted,
//! whether it came from a local operation or from a peer.

use crate::error::ValidationError;
use crate::record::IdentifierRecord;
use crate::status::Status;

/// Validate a record's structure.
///
/// This performs:
/// - Identifier and owner format checks
/// - Unclaimed records are never persisted
/// - Anchored statuses carry a non-empty document anchor
pub fn validate_record(record: &IdentifierRecord) -> Result<(), ValidationError> {
    if !record.id.is_valid_format() {
        return Err(ValidationError::InvalidId(record.id.clone()));
    }

    if !record.owner.is_valid_format() {
        return Err(ValidationError::InvalidOwner {
            id: record.id.clone(),
            owner: record.owner.clone(),
        });
    }

    if record.status == Status::Unclaimed {
        return Err(ValidationError::UnclaimedRecord(record.id.clone()));
    }

    if matches!(record.status, Status::Registered | Status::Frozen) {
        match &record.doc {
            Some(doc) if !doc.address.is_empty() && !doc.hash.is_empty() => {}
            _ => return Err(ValidationError::MissingAnchor(record.id.clone())),
        }
    }

    Ok(())
}

/// Validate a record received from another registry.
///
/// On top of [`validate_record`], the status must be an anchored one.
pub fn validate_mirrored_record(record: &IdentifierRecord) -> Result<(), ValidationError> {
    validate_record(record)?;

    if !matches!(record.status, Status::Registered | Status::Frozen) {
        return Err(ValidationError::StructuralError(format!(
            "mirrored record {} has unanchored status {}",
            record.id, record.status
        )));
    }

    Ok(())
}
