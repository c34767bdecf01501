/// Formats a 24-hour `HH:MM` (or `HH:MM:SS`) string as `H:MMam` / `H:MMpm`.
pub fn format_time(time: &str) -> String {
    if time.is_empty() || has_meridiem(time) {
        return time.to_string();
    }
    match split_clock(time) {
        Some((hour, minute)) => {
            let suffix = if hour >= 12 { "pm" } else { "am" };
            format!("{}:{minute}{suffix}", twelve_hour(hour))
        }
        None => time.to_string(),
    }
}

pub fn format_picker_time(time: &str) -> Option<String> {
    let (hour, minute) = split_clock(time)?;
    let suffix = if hour >= 12 { "PM" } else { "AM" };
    Some(format!("{}:{minute} {suffix}", twelve_hour(hour)))
}

pub fn clock_minutes(time: &str) -> Option<u32> {
    let normalized = time.trim().to_ascii_lowercase();
    let (clock, meridiem) = if let Some(rest) = normalized.strip_suffix("am") {
        (rest.trim_end(), Some(false))
    } else if let Some(rest) = normalized.strip_suffix("pm") {
        (rest.trim_end(), Some(true))
    } else {
        (normalized.as_str(), None)
    };

    let mut parts = clock.split(':');
    let hour = parts.next()?.trim().parse::<u32>().ok()?;
    let minute = parts.next()?.trim().parse::<u32>().ok()?;
    if minute > 59 {
        return None;
    }

    let hour = match meridiem {
        Some(is_pm) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            hour % 12 + if is_pm { 12 } else { 0 }
        }
        None if hour <= 23 => hour,
        None => return None,
    };
    Some(hour * 60 + minute)
}

fn has_meridiem(time: &str) -> bool {
    let lowered = time.to_ascii_lowercase();
    lowered.contains("am") || lowered.contains("pm")
}

fn split_clock(time: &str) -> Option<(u32, &str)> {
    let mut parts = time.split(':');
    let hour = parts.next()?.trim().parse::<u32>().ok()?;
    let minute = parts.next()?;
    if hour > 23 {
        return None;
    }
    Some((hour, minute))
}

fn twelve_hour(hour: u32) -> u32 {
    match hour % 12 {
        0 => 12,
        value => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formats_boundary_hours() {
        assert_eq!(format_time("00:00"), "12:00am");
        assert_eq!(format_time("00:05"), "12:05am");
        assert_eq!(format_time("09:30"), "9:30am");
        assert_eq!(format_time("11:59"), "11:59am");
        assert_eq!(format_time("12:00"), "12:00pm");
        assert_eq!(format_time("13:07"), "1:07pm");
        assert_eq!(format_time("23:59"), "11:59pm");
    }

    #[test]
    fn seconds_from_sql_time_columns_are_dropped() {
        assert_eq!(format_time("18:45:00"), "6:45pm");
    }

    #[test]
    fn already_formatted_values_pass_through() {
        assert_eq!(format_time("9:30 AM"), "9:30 AM");
        assert_eq!(format_time("12:00pm"), "12:00pm");
        assert_eq!(format_time("7:15 Pm"), "7:15 Pm");
    }

    #[test]
    fn empty_and_malformed_values_pass_through() {
        assert_eq!(format_time(""), "");
        assert_eq!(format_time("noon"), "noon");
        assert_eq!(format_time("25:00"), "25:00");
        assert_eq!(format_time("14"), "14");
    }

    #[test]
    fn picker_time_uses_uppercase_meridiem() {
        assert_eq!(format_picker_time("00:10"), Some("12:10 AM".to_string()));
        assert_eq!(format_picker_time("17:30"), Some("5:30 PM".to_string()));
        assert_eq!(format_picker_time("later"), None);
    }

    #[test]
    fn clock_minutes_reads_both_clock_styles() {
        assert_eq!(clock_minutes("00:00"), Some(0));
        assert_eq!(clock_minutes("09:30"), Some(570));
        assert_eq!(clock_minutes("9:30 AM"), Some(570));
        assert_eq!(clock_minutes("12:15am"), Some(15));
        assert_eq!(clock_minutes("12:15 PM"), Some(735));
        assert_eq!(clock_minutes("6:45pm"), Some(1125));
        assert_eq!(clock_minutes("18:45:00"), Some(1125));
        assert_eq!(clock_minutes("13:00 PM"), None);
        assert_eq!(clock_minutes("whenever"), None);
    }

    #[test]
    fn every_clock_value_matches_twelve_hour_convention() {
        for hour in 0u32..24 {
            for minute in 0u32..60 {
                let input = format!("{hour:02}:{minute:02}");
                let formatted = format_time(&input);
                let expected_hour = if hour % 12 == 0 { 12 } else { hour % 12 };
                let expected_suffix = if hour < 12 { "am" } else { "pm" };
                assert_eq!(
                    formatted,
                    format!("{expected_hour}:{minute:02}{expected_suffix}")
                );
                assert_eq!(clock_minutes(&formatted), Some(hour * 60 + minute));
            }
        }
    }

    proptest! {
        #[test]
        fn formatting_is_idempotent(hour in 0u32..24, minute in 0u32..60) {
            let once = format_time(&format!("{hour:02}:{minute:02}"));
            prop_assert_eq!(format_time(&once), once.clone());
        }

        #[test]
        fn picker_and_display_forms_agree_on_minutes(hour in 0u32..24, minute in 0u32..60) {
            let input = format!("{hour:02}:{minute:02}");
            let picker = format_picker_time(&input).expect("valid clock value");
            prop_assert_eq!(clock_minutes(&picker), clock_minutes(&input));
        }
    }
}
