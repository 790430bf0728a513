//! Post locations and their QR tokens

use ronda_api::{
    Identity, LocationUpdate, NewLocation, PostLocation, TokenRotation, MAX_RADIUS_METERS,
    MIN_RADIUS_METERS,
};
use ronda_store::{AuditEventType, StoreTx};
use ronda_util::{Coordinates, LocationId};
use rand::distributions::{Alphanumeric, DistString};
use tracing::{info, warn};

use crate::service::ensure_same_unit;
use crate::{PatrolError, PatrolResult, PatrolService};

/// Length of generated QR tokens
pub const QR_TOKEN_LENGTH: usize = 32;

const MAX_TOKEN_ATTEMPTS: usize = 8;

/// A random token not currently assigned to any post
fn fresh_token(tx: &dyn StoreTx) -> PatrolResult<String> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_TOKEN_ATTEMPTS {
        let token = Alphanumeric.sample_string(&mut rng, QR_TOKEN_LENGTH);
        if tx.find_location_by_token(&token)?.is_none() {
            return Ok(token);
        }
        warn!("QR token collision, regenerating");
    }
    Err(PatrolError::validation("could not allocate a unique QR token"))
}

fn validate_location(name: &str, latitude: f64, longitude: f64, radius_meters: u32) -> PatrolResult<()> {
    if name.trim().is_empty() {
        return Err(PatrolError::validation("location name cannot be empty"));
    }
    if !Coordinates::new(latitude, longitude).is_valid() {
        return Err(PatrolError::validation(format!(
            "invalid coordinates ({latitude}, {longitude})"
        )));
    }
    if !(MIN_RADIUS_METERS..=MAX_RADIUS_METERS).contains(&radius_meters) {
        return Err(PatrolError::validation(format!(
            "radius_meters must be between {MIN_RADIUS_METERS} and {MAX_RADIUS_METERS}, got {radius_meters}"
        )));
    }
    Ok(())
}

fn owned_location(
    tx: &dyn StoreTx,
    identity: &Identity,
    location_id: LocationId,
) -> PatrolResult<PostLocation> {
    let location = tx
        .get_location(location_id)?
        .ok_or_else(|| PatrolError::not_found("location", location_id))?;
    ensure_same_unit(identity, &location.unit_id)?;
    Ok(location)
}

impl PatrolService {
    /// New post with a static token that never expires until first rotated
    pub fn create_location(
        &self,
        identity: &Identity,
        new: NewLocation,
    ) -> PatrolResult<PostLocation> {
        let radius_meters = new
            .radius_meters
            .unwrap_or(self.settings.attendance.default_radius_meters);
        let name = new.name.trim().to_string();
        validate_location(&name, new.latitude, new.longitude, radius_meters)?;

        let now = self.now();
        let tx = self.store.begin()?;

        let location = PostLocation {
            id: LocationId::new(),
            unit_id: identity.unit_id.clone(),
            name,
            latitude: new.latitude,
            longitude: new.longitude,
            radius_meters,
            qr_token: fresh_token(&*tx)?,
            token_expires_at: None,
            created_at: now,
        };
        tx.insert_location(&location)?;

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::LocationCreated {
                location_id: location.id,
                name: location.name.clone(),
            },
        )?;
        tx.commit()?;

        info!(
            location_id = %location.id,
            name = %location.name,
            radius_m = location.radius_meters,
            "Post location created"
        );
        Ok(location)
    }

    /// Replace the token. The old one stops working immediately.
    pub fn rotate_token(
        &self,
        identity: &Identity,
        location_id: LocationId,
    ) -> PatrolResult<TokenRotation> {
        let now = self.now();
        let tx = self.store.begin()?;
        let mut location = owned_location(&*tx, identity, location_id)?;

        location.qr_token = fresh_token(&*tx)?;
        location.token_expires_at = Some(now + self.settings.attendance.token_ttl);
        tx.update_location(&location)?;

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::TokenRotated {
                location_id: location.id,
                expires_at: location.token_expires_at,
            },
        )?;
        tx.commit()?;

        info!(location_id = %location.id, "QR token rotated");
        Ok(TokenRotation {
            location_id: location.id,
            qr_token: location.qr_token,
            token_expires_at: location.token_expires_at,
        })
    }

    pub fn update_location(
        &self,
        identity: &Identity,
        location_id: LocationId,
        update: LocationUpdate,
    ) -> PatrolResult<PostLocation> {
        let now = self.now();
        let tx = self.store.begin()?;
        let mut location = owned_location(&*tx, identity, location_id)?;

        if let Some(name) = update.name {
            location.name = name.trim().to_string();
        }
        if let Some(latitude) = update.latitude {
            location.latitude = latitude;
        }
        if let Some(longitude) = update.longitude {
            location.longitude = longitude;
        }
        if let Some(radius_meters) = update.radius_meters {
            location.radius_meters = radius_meters;
        }
        validate_location(
            &location.name,
            location.latitude,
            location.longitude,
            location.radius_meters,
        )?;
        tx.update_location(&location)?;

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::LocationUpdated {
                location_id: location.id,
            },
        )?;
        tx.commit()?;

        info!(location_id = %location.id, "Post location updated");
        Ok(location)
    }

    pub fn delete_location(
        &self,
        identity: &Identity,
        location_id: LocationId,
    ) -> PatrolResult<LocationId> {
        let now = self.now();
        let tx = self.store.begin()?;
        let location = owned_location(&*tx, identity, location_id)?;
        tx.delete_location(location.id)?;

        self.audit(
            &*tx,
            identity,
            now,
            AuditEventType::LocationDeleted {
                location_id: location.id,
            },
        )?;
        tx.commit()?;

        info!(location_id = %location.id, "Post location deleted");
        Ok(location.id)
    }

    pub fn list_locations(&self, identity: &Identity) -> PatrolResult<Vec<PostLocation>> {
        let tx = self.store.begin()?;
        let locations = tx.list_locations(&identity.unit_id)?;
        tx.commit()?;
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::harness;
    use chrono::Duration;

    fn gate() -> NewLocation {
        NewLocation {
            name: "Main gate".into(),
            latitude: -6.2001,
            longitude: 106.8166,
            radius_meters: None,
        }
    }

    #[test]
    fn created_token_is_static() {
        let h = harness();
        let location = h.service.create_location(&h.admin, gate()).unwrap();

        assert_eq!(location.radius_meters, 50);
        assert_eq!(location.qr_token.len(), QR_TOKEN_LENGTH);
        assert!(location.token_expires_at.is_none());
    }

    #[test]
    fn rotation_sets_expiry_and_replaces_token() {
        let h = harness();
        let location = h.service.create_location(&h.admin, gate()).unwrap();

        let rotation = h.service.rotate_token(&h.admin, location.id).unwrap();
        assert_ne!(rotation.qr_token, location.qr_token);
        assert_eq!(
            rotation.token_expires_at,
            Some(h.service.now() + Duration::hours(24))
        );

        let listed = h.service.list_locations(&h.admin).unwrap();
        assert_eq!(listed[0].qr_token, rotation.qr_token);
    }

    #[test]
    fn radius_bounds_are_enforced() {
        let h = harness();
        for radius in [4, 501] {
            let mut new = gate();
            new.radius_meters = Some(radius);
            assert!(matches!(
                h.service.create_location(&h.admin, new),
                Err(PatrolError::Validation(_))
            ));
        }

        let mut edge = gate();
        edge.radius_meters = Some(500);
        assert!(h.service.create_location(&h.admin, edge).is_ok());
    }

    #[test]
    fn coordinates_and_name_are_validated() {
        let h = harness();

        let mut bad_lat = gate();
        bad_lat.latitude = 95.0;
        assert!(h.service.create_location(&h.admin, bad_lat).is_err());

        let mut blank = gate();
        blank.name = " ".into();
        assert!(h.service.create_location(&h.admin, blank).is_err());
    }

    #[test]
    fn update_and_delete() {
        let h = harness();
        let location = h.service.create_location(&h.admin, gate()).unwrap();

        let updated = h
            .service
            .update_location(
                &h.admin,
                location.id,
                LocationUpdate {
                    name: Some("North gate".into()),
                    radius_meters: Some(100),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "North gate");
        assert_eq!(updated.radius_meters, 100);
        assert_eq!(updated.qr_token, location.qr_token);

        // Invalid update leaves the post untouched
        assert!(h
            .service
            .update_location(
                &h.admin,
                location.id,
                LocationUpdate {
                    radius_meters: Some(1),
                    ..Default::default()
                },
            )
            .is_err());
        assert_eq!(h.service.list_locations(&h.admin).unwrap()[0].radius_meters, 100);

        h.service.delete_location(&h.admin, location.id).unwrap();
        assert!(h.service.list_locations(&h.admin).unwrap().is_empty());
    }

    #[test]
    fn other_units_cannot_touch_posts() {
        let h = harness();
        let location = h.service.create_location(&h.admin, gate()).unwrap();
        let outsider = Identity::new("mallory", "rt-06");

        assert!(matches!(
            h.service.rotate_token(&outsider, location.id),
            Err(PatrolError::CrossUnitAccess)
        ));
        assert!(h.service.list_locations(&outsider).unwrap().is_empty());
    }
}
