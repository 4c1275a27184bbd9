//! Validation of transport requests
//!
//! Requests are validated in full before any Transporter is contacted.

use tracing::debug;

use upa_core::{BrokerFault, Region};

/// A request that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub origin: Region,
    pub destination: Region,
    /// Highest price the client accepts
    pub ceiling: i64,
}

/// Validate a transport request
///
/// Checks, in order:
/// 1. the origin is a known region
/// 2. the destination is a known region
/// 3. origin and destination differ (the fault names the destination)
/// 4. the price ceiling is not negative
pub fn validate_request(origin: &str, destination: &str, price: i64) -> Result<Route, BrokerFault> {
    let origin_region = parse_location(origin)?;
    let destination_region = parse_location(destination)?;

    if origin_region == destination_region {
        debug!(origin = %origin, destination = %destination, "Origin and destination are the same");
        return Err(BrokerFault::UnknownLocation {
            location: destination.to_string(),
        });
    }

    if price < 0 {
        return Err(BrokerFault::InvalidPrice { price });
    }

    Ok(Route {
        origin: origin_region,
        destination: destination_region,
        ceiling: price,
    })
}

fn parse_location(location: &str) -> Result<Region, BrokerFault> {
    location.parse().map_err(|_| BrokerFault::UnknownLocation {
        location: location.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let route = validate_request("Lisboa", "Porto", 50).unwrap();
        assert_eq!(route.origin, Region::Lisboa);
        assert_eq!(route.destination, Region::Porto);
        assert_eq!(route.ceiling, 50);
    }

    #[test]
    fn test_zero_price_is_valid() {
        assert!(validate_request("Faro", "Beja", 0).is_ok());
    }

    #[test]
    fn test_origin_checked_first() {
        assert_eq!(
            validate_request("Atlantis", "Narnia", -1),
            Err(BrokerFault::UnknownLocation {
                location: "Atlantis".into()
            })
        );
    }

    #[test]
    fn test_unknown_destination() {
        assert_eq!(
            validate_request("Lisboa", "Narnia", 10),
            Err(BrokerFault::UnknownLocation {
                location: "Narnia".into()
            })
        );
    }

    #[test]
    fn test_same_location_names_destination() {
        // Equal by value even when spelled differently
        assert_eq!(
            validate_request("Lisboa", "lisboa", 10),
            Err(BrokerFault::UnknownLocation {
                location: "lisboa".into()
            })
        );
    }

    #[test]
    fn test_location_checked_before_price() {
        assert!(matches!(
            validate_request("Lisboa", "Lisboa", -5),
            Err(BrokerFault::UnknownLocation { .. })
        ));
    }

    #[test]
    fn test_negative_price() {
        assert_eq!(
            validate_request("Lisboa", "Porto", -1),
            Err(BrokerFault::InvalidPrice { price: -1 })
        );
    }
}
