use predict_core::{CallContext, OracleError, Receipt, Result, Role};
use tracing::info;

use crate::authority::OracleAuthority;
use crate::ledger::PredictionLedger;

/// Second phase of deployment: point the ledger at the authority and the
/// authority at the ledger.
///
/// Both sides are checked before either is written, so a failed link leaves
/// both components untouched.
pub fn link(ctx: &CallContext, ledger: &mut PredictionLedger, authority: &mut OracleAuthority) -> Result<Receipt> {
    for owner in [ledger.owner(), authority.owner()] {
        if ctx.caller != owner {
            return Err(OracleError::Unauthorized {
                caller: ctx.caller,
                required: Role::Owner,
            });
        }
    }
    if ledger.authority().is_some() || authority.is_linked() {
        return Err(OracleError::AlreadyLinked);
    }
    if ledger.address().is_zero() || authority.address().is_zero() {
        return Err(OracleError::NotLinked);
    }

    let mut receipt = ledger.link_authority(ctx, authority.address())?;
    receipt.append(authority.link_ledger(ctx, ledger.address())?);

    info!("Linked ledger {} <-> authority {}", ledger.address(), authority.address());
    Ok(receipt)
}
