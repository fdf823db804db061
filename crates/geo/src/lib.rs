use serde::{Deserialize, Deserializer, Serialize};

pub const EARTH_RADIUS_MILES: f64 = 3959.0;
pub const BASE_FARE: f64 = 2.50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RideType {
    Economy,
    #[default]
    Standard,
    Premium,
    Xl,
}

impl RideType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "economy" => RideType::Economy,
            "standard" => RideType::Standard,
            "premium" => RideType::Premium,
            "xl" => RideType::Xl,
            _ => RideType::Standard,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RideType::Economy => "economy",
            RideType::Standard => "standard",
            RideType::Premium => "premium",
            RideType::Xl => "xl",
        }
    }

    pub fn per_mile_rate(self) -> f64 {
        match self {
            RideType::Economy => 1.20,
            RideType::Standard => 1.50,
            RideType::Premium => 2.00,
            RideType::Xl => 2.50,
        }
    }
}

// Unknown tiers price at the standard rate instead of failing the request.
impl<'de> Deserialize<'de> for RideType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(RideType::from_name(&name))
    }
}

pub fn distance_miles(a: Coordinates, b: Coordinates) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlng = (dlng / 2.0).sin();
    let h = sin_dlat * sin_dlat
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * sin_dlng * sin_dlng;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    round_2dp(EARTH_RADIUS_MILES * c)
}

pub fn estimate_fare(distance_miles: f64, ride_type: RideType) -> f64 {
    round_2dp(BASE_FARE + distance_miles * ride_type.per_mile_rate())
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinates {
        Coordinates { lat, lng }
    }

    #[test]
    fn distance_is_commutative() {
        let a = coord(40.7128, -74.0060);
        let b = coord(34.0522, -118.2437);
        assert_eq!(distance_miles(a, b), distance_miles(b, a));
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = coord(51.5074, -0.1278);
        assert_eq!(distance_miles(a, a), 0.0);
    }

    #[test]
    fn one_tenth_degree_of_latitude() {
        let d = distance_miles(coord(40.0, -73.0), coord(40.1, -73.0));
        assert_eq!(d, 6.91);
        assert_eq!(estimate_fare(d, RideType::Standard), 12.87);
    }

    #[test]
    fn fare_uses_tier_rates() {
        assert_eq!(estimate_fare(10.0, RideType::Economy), 14.50);
        assert_eq!(estimate_fare(10.0, RideType::Standard), 17.50);
        assert_eq!(estimate_fare(10.0, RideType::Premium), 22.50);
        assert_eq!(estimate_fare(10.0, RideType::Xl), 27.50);
    }

    #[test]
    fn zero_distance_fare_is_base_fare() {
        assert_eq!(estimate_fare(0.0, RideType::Premium), BASE_FARE);
    }

    #[test]
    fn fare_rounds_to_cents() {
        // 2.50 + 3.33 * 1.50 = 7.495
        assert_eq!(estimate_fare(3.33, RideType::Standard), 7.50);
    }

    #[test]
    fn unknown_tier_prices_as_standard() {
        assert_eq!(RideType::from_name("luxury"), RideType::Standard);
        let parsed: RideType = serde_json::from_str("\"luxury\"").expect("parse");
        assert_eq!(parsed, RideType::Standard);
        assert_eq!(
            estimate_fare(10.0, parsed),
            estimate_fare(10.0, RideType::Standard)
        );
    }

    #[test]
    fn known_tiers_round_trip() {
        for tier in [
            RideType::Economy,
            RideType::Standard,
            RideType::Premium,
            RideType::Xl,
        ] {
            let text = serde_json::to_string(&tier).expect("encode");
            let parsed: RideType = serde_json::from_str(&text).expect("parse");
            assert_eq!(parsed, tier);
        }
    }
}
