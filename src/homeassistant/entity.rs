//! Entity descriptors.

/// Which way values of an entity travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Values flow from the hub into the device (commands, set points).
    In,
    /// Values flow from the device to the hub (sensor readings).
    Out,
    /// Both, with separately namespaced topics and discovery entries.
    Both,
}

impl Direction {
    /// Whether the inbound flow is part of this direction.
    pub const fn includes_in(self) -> bool {
        matches!(self, Direction::In | Direction::Both)
    }

    /// Whether the outbound flow is part of this direction.
    pub const fn includes_out(self) -> bool {
        matches!(self, Direction::Out | Direction::Both)
    }
}

/// One concrete flow of an entity. Each flow has its own topic pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Hub to device.
    In,
    /// Device to hub.
    Out,
}

impl Flow {
    /// Topic segment, `in` or `out`.
    pub const fn segment(self) -> &'static str {
        match self {
            Flow::In => "in",
            Flow::Out => "out",
        }
    }

    /// Suffix appended to the entity name in discovery, `_IN` or `_OUT`.
    pub const fn name_suffix(self) -> &'static str {
        match self {
            Flow::In => "_IN",
            Flow::Out => "_OUT",
        }
    }
}

/// A logical sensor or actuator exposed by the device.
///
/// `code` must be unique within the device; it becomes part of every topic
/// and is the key of the state payload.
///
/// ```rust
/// use hamqtt::homeassistant::{Direction, EntityDescriptor};
///
/// const TEMPERATURE: EntityDescriptor<'static> =
///     EntityDescriptor::new("Temperature", "temp", Direction::Out)
///         .with_device_class("temperature")
///         .with_unit("°C");
///
/// assert!(TEMPERATURE.direction.includes_out());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor<'a> {
    /// Human-readable name.
    pub name: &'a str,
    /// Entity code, unique per device.
    pub code: &'a str,
    /// Home Assistant device class, passed through verbatim.
    pub device_class: &'a str,
    /// Unit of measurement, passed through verbatim.
    pub unit_of_measurement: &'a str,
    /// Which flows the entity has.
    pub direction: Direction,
}

impl<'a> EntityDescriptor<'a> {
    /// Entity with empty device class and unit.
    pub const fn new(name: &'a str, code: &'a str, direction: Direction) -> Self {
        Self {
            name,
            code,
            device_class: "",
            unit_of_measurement: "",
            direction,
        }
    }

    /// Set device class
    #[must_use]
    pub const fn with_device_class(mut self, device_class: &'a str) -> Self {
        self.device_class = device_class;
        self
    }

    /// Set unit of measurement
    #[must_use]
    pub const fn with_unit(mut self, unit: &'a str) -> Self {
        self.unit_of_measurement = unit;
        self
    }
}
