//! Records managed by Standbook.
//!
//! Spaces and zones both live on a plan canvas and share the same shape
//! description, so the shape is a [`Geometry`] value embedded (flattened) in
//! each record rather than a common base record.

use crate::types::{EventId, PlanId, ReservationId, SpaceId, UserId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Geometry
// ============================================================================

/// Shape primitive used to draw a space or zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle (before rotation)
    Rect,
    /// Circle inscribed in the bounding box
    Circle,
    /// Ellipse inscribed in the bounding box
    Ellipse,
}

impl ShapeKind {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rect => "rect",
            Self::Circle => "circle",
            Self::Ellipse => "ellipse",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rect" => Some(Self::Rect),
            "circle" => Some(Self::Circle),
            "ellipse" => Some(Self::Ellipse),
            _ => None,
        }
    }
}

/// Position, size and styling of a shape on a plan canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Shape primitive
    #[serde(default = "default_kind")]
    pub kind: ShapeKind,
    /// Left edge in canvas pixels
    pub x: f64,
    /// Top edge in canvas pixels
    pub y: f64,
    /// Width in canvas pixels
    pub width: f64,
    /// Height in canvas pixels
    pub height: f64,
    /// Clockwise rotation in degrees
    #[serde(default)]
    pub rotation: f64,
    /// Fill colour as `#RRGGBB`
    pub color: String,
}

const fn default_kind() -> ShapeKind {
    ShapeKind::Rect
}

impl Geometry {
    /// Check the shape can be drawn.
    ///
    /// # Errors
    ///
    /// Returns a human readable reason when a dimension is not positive, a
    /// coordinate is not finite, or the colour is not `#RRGGBB`.
    pub fn validate(&self) -> Result<(), String> {
        if ![self.x, self.y, self.width, self.height, self.rotation]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err("geometry values must be finite numbers".to_string());
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err("width and height must be positive".to_string());
        }
        let hex = self.color.strip_prefix('#').unwrap_or_default();
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("color {:?} is not in #RRGGBB format", self.color));
        }
        Ok(())
    }
}

// ============================================================================
// Registry records
// ============================================================================

/// A reservable stand on a plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Space {
    /// Space ID
    pub id: SpaceId,
    /// Owning plan
    #[serde(rename = "plano_id")]
    pub plan_id: PlanId,
    /// Optional grouping zone
    pub zone_id: Option<ZoneId>,
    /// Display name (rewritten with the holder's company on confirmation)
    pub name: String,
    /// Shape on the canvas
    #[serde(flatten)]
    pub geometry: Geometry,
    /// Indicative price
    pub price: Option<f64>,
    /// `false` when the space is blocked from reservation
    pub active: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// A labelled area grouping spaces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone ID
    pub id: ZoneId,
    /// Owning plan
    #[serde(rename = "plano_id")]
    pub plan_id: PlanId,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Shape on the canvas
    #[serde(flatten)]
    pub geometry: Geometry,
    /// Indicative price for spaces in the zone
    pub price: Option<f64>,
    /// Whether the zone is shown
    pub active: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// A floor-plan canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan ID
    pub id: PlanId,
    /// Owning event, if any
    #[serde(rename = "evento_id")]
    pub event_id: Option<EventId>,
    /// Display name
    pub name: String,
    /// Location of the background image
    pub url: String,
    /// Canvas width in pixels
    pub width: i32,
    /// Canvas height in pixels
    pub height: i32,
    /// Scale calibration
    pub pixels_per_meter: Option<f64>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// A trade fair or similar grouping of plans.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Reservations open at
    pub reservable_from: Option<DateTime<Utc>>,
    /// Reservations close at
    pub reservable_until: Option<DateTime<Utc>>,
    /// Listed to anonymous visitors
    pub visible: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Check the reservation window is ordered.
    ///
    /// # Errors
    ///
    /// Returns a reason when `reservable_from` is after `reservable_until`.
    pub fn validate(&self) -> Result<(), String> {
        match (self.reservable_from, self.reservable_until) {
            (Some(from), Some(until)) if from > until => {
                Err("reservation window starts after it ends".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Contact details of an exhibitor, keyed by the external identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// External identity
    pub user_id: UserId,
    /// Contact email
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// `LinkedIn` profile
    pub linkedin: Option<String>,
    /// Company name
    pub company: Option<String>,
    /// Position within the company
    pub position: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// A profile is complete once it carries a non-blank email.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// Company name with surrounding whitespace removed, if non-blank.
    #[must_use]
    pub fn company_name(&self) -> Option<&str> {
        self.company
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

// ============================================================================
// Reservations
// ============================================================================

/// Lifecycle state of a reservation.
///
/// ```text
/// PENDING ──confirm──> RESERVED ──request──> CANCELLATION_REQUESTED
///    │  ╲                 │    ^                  │        │
///    │   expire/reject    cancel └──────deny──────┘      approve
///    v         v          v                                 v
/// CANCELLED  EXPIRED   CANCELLED                        CANCELLED
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    /// Held, waiting for admin confirmation; may carry an expiry marker
    Pending,
    /// Confirmed by an admin
    Reserved,
    /// Hold lapsed before confirmation (terminal)
    Expired,
    /// Cancelled or rejected (terminal)
    Cancelled,
    /// Owner asked to give the space back; waiting for an admin
    CancellationRequested,
}

impl ReservationState {
    /// States that occupy the space.
    pub const ACTIVE: [Self; 3] = [Self::Pending, Self::Reserved, Self::CancellationRequested];

    /// Whether this state occupies the space.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Reserved | Self::CancellationRequested
        )
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Cancelled)
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Reserved => "RESERVED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
            Self::CancellationRequested => "CANCELLATION_REQUESTED",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "RESERVED" => Some(Self::Reserved),
            "EXPIRED" => Some(Self::Expired),
            "CANCELLED" => Some(Self::Cancelled),
            "CANCELLATION_REQUESTED" => Some(Self::CancellationRequested),
            _ => None,
        }
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hold or booking of one space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation ID
    pub id: ReservationId,
    /// Reserved space
    pub space_id: SpaceId,
    /// Requesting user; `None` for admin-created reservations
    pub user_id: Option<UserId>,
    /// Display name of the holder
    pub asignee: String,
    /// Lifecycle state
    #[serde(rename = "estado")]
    pub state: ReservationState,
    /// Hold deadline, set by hold refreshes
    pub expires_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Whether `user_id` made this reservation.
    #[must_use]
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.user_id.as_ref() == Some(user_id)
    }
}

/// Public part of the holder's profile shown on confirmed reservations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    /// Company name
    pub company: Option<String>,
    /// `LinkedIn` profile
    pub linkedin: Option<String>,
    /// Contact email
    pub email: Option<String>,
}

impl From<&UserProfile> for ClientProfile {
    fn from(profile: &UserProfile) -> Self {
        Self {
            company: profile.company.clone(),
            linkedin: profile.linkedin.clone(),
            email: profile.email.clone(),
        }
    }
}

/// Reservation enriched with the context clients render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReservationView {
    /// The reservation record
    #[serde(flatten)]
    pub reservation: Reservation,
    /// Current display name of the space
    pub space_name: Option<String>,
    /// Plan the space belongs to
    #[serde(rename = "plano_id")]
    pub plan_id: Option<PlanId>,
    /// Holder contact details, only for RESERVED reservations
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_profile: Option<ClientProfile>,
}

impl ReservationView {
    /// Build a view from the reservation and whatever context is at hand.
    #[must_use]
    pub fn new(
        reservation: Reservation,
        space: Option<&Space>,
        profile: Option<&UserProfile>,
    ) -> Self {
        let client_profile = if reservation.state == ReservationState::Reserved {
            profile.map(ClientProfile::from)
        } else {
            None
        };
        Self {
            space_name: space.map(|s| s.name.clone()),
            plan_id: space.map(|s| s.plan_id),
            client_profile,
            reservation,
        }
    }
}

/// Coarse status an admin can force onto a space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpaceStatus {
    /// Free and open for reservation
    Available,
    /// Closed for reservation
    Blocked,
    /// Held, awaiting confirmation
    Pending,
    /// Confirmed
    Reserved,
}
