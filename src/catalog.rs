use chrono::TimeDelta;

/// The service catalog: service key → duration in minutes.
///
/// Static and immutable at runtime. Appointments store the raw key, so rows
/// with keys no longer in this table can exist in the ledger; callers decide
/// how to treat them (the scheduling engine skips them during conflict and
/// availability computation).
const SERVICES: &[(&str, i64)] = &[
    ("shape_up", 15),
    ("beard_trim", 15),
    ("haircut", 30),
    ("fade", 30),
    ("scissors_cut", 30),
    ("cut_and_beard", 45),
];

pub fn duration_minutes(service: &str) -> Option<i64> {
    SERVICES
        .iter()
        .find(|(key, _)| *key == service)
        .map(|(_, minutes)| *minutes)
}

pub fn duration(service: &str) -> Option<TimeDelta> {
    duration_minutes(service).map(TimeDelta::minutes)
}

pub fn is_known(service: &str) -> bool {
    duration_minutes(service).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_services_resolve() {
        assert_eq!(duration_minutes("haircut"), Some(30));
        assert_eq!(duration_minutes("shape_up"), Some(15));
        assert_eq!(duration_minutes("cut_and_beard"), Some(45));
    }

    #[test]
    fn unknown_service_is_none() {
        assert_eq!(duration_minutes("perm"), None);
        assert!(!is_known(""));
    }

    #[test]
    fn duration_matches_minutes() {
        assert_eq!(duration("fade"), Some(TimeDelta::minutes(30)));
    }
}
