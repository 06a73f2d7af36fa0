//! Post-confirm side effects.

use standbook_core::gateway::{GatewayFuture, StoreError, UnitOfWork};
use standbook_core::{Reservation, Space};
use standbook_runtime::ConfirmHook;

/// Renames a confirmed space after its occupant.
///
/// The new name is the requester's profile company when it is set, otherwise
/// the reservation's asignee. Runs inside the confirming unit of work, so a
/// failed rename rolls the confirmation back.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpaceNamingHook;

impl SpaceNamingHook {
    async fn display_name(
        uow: &mut dyn UnitOfWork,
        reservation: &Reservation,
    ) -> Result<String, StoreError> {
        if let Some(user_id) = &reservation.user_id {
            if let Some(profile) = uow.profile(user_id).await? {
                if let Some(company) = profile.company_name() {
                    return Ok(company.to_string());
                }
            }
        }
        Ok(reservation.asignee.trim().to_string())
    }
}

impl ConfirmHook for SpaceNamingHook {
    fn after_confirm<'a>(
        &'a self,
        uow: &'a mut dyn UnitOfWork,
        reservation: &'a Reservation,
    ) -> GatewayFuture<'a, Option<Space>> {
        Box::pin(async move {
            let name = Self::display_name(uow, reservation).await?;
            if name.is_empty() {
                return Ok(None);
            }

            let Some(mut space) = uow.space(reservation.space_id).await? else {
                return Ok(None);
            };
            if space.name == name {
                return Ok(None);
            }

            tracing::debug!(space_id = %space.id, from = %space.name, to = %name, "Renaming confirmed space");
            space.name = name;
            space.updated_at = reservation.updated_at;
            uow.save_space(space.clone()).await?;
            Ok(Some(space))
        })
    }
}
