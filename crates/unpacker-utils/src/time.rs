use chrono::Local;

/// Wall-clock time of day as `HH:MM:SS`, used to prefix transcript lines.
pub fn clock_stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Prefixes `message` with the current [`clock_stamp`].
pub fn stamped(message: &str) -> String {
    format!("[{}] {message}", clock_stamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_stamp_shape() {
        let stamp = clock_stamp();
        assert_eq!(stamp.len(), 8);
        let parts: Vec<_> = stamp.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.len() == 2 && p.parse::<u8>().is_ok()));
    }

    #[test]
    fn test_stamped_line() {
        let line = stamped("Extracting archive");
        assert!(line.starts_with('['));
        assert_eq!(&line[9..], "] Extracting archive");
    }
}
