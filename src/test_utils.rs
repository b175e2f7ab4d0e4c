/*
 * Test utilities and mock helpers for Superfan
 *
 * Fake hwmon trees and canned command output shared by the unit tests.
 */

#[cfg(test)]
pub mod test_utils {
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// `sensors` output as printed on an AM5 board with an nct6687 chip
    pub const SENSORS_OUTPUT: &str = "\
k10temp-pci-00c3
Adapter: PCI adapter
Tctl:         +72.5°C
Tccd1:        +61.0°C

nct6687-isa-0a20
Adapter: ISA adapter
+12V:          12.24 V
CPU:          +70.0°C  (low  =  +0.0°C, high = +100.0°C)
System:       +42.0°C  (low  =  +0.0°C, high = +100.0°C)
";

    /// Creates `<tmp>/sys/class/hwmon/<dir>` for each `(dir, name)` with
    /// `pwm1..=channels` and matching `_enable` files.
    pub fn create_mock_hwmon_dir(chips: &[(&str, &str)], channels: usize) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = hwmon_root(&temp_dir);
        for (dir, name) in chips {
            let chip = root.join(dir);
            fs::create_dir_all(&chip).unwrap();
            fs::write(chip.join("name"), format!("{}\n", name)).unwrap();
            for i in 1..=channels {
                fs::write(chip.join(format!("pwm{}", i)), "128\n").unwrap();
                fs::write(chip.join(format!("pwm{}_enable", i)), "2\n").unwrap();
            }
        }
        fs::create_dir_all(&root).unwrap();
        temp_dir
    }

    pub fn hwmon_root(tmp: &TempDir) -> PathBuf {
        tmp.path().join("sys/class/hwmon")
    }

    pub fn read_attr(path: &Path) -> String {
        fs::read_to_string(path).unwrap().trim().to_string()
    }

    /// Asserts that two floating point numbers are approximately equal
    pub fn assert_approx_eq(a: f64, b: f64, tolerance: f64) {
        assert!(
            (a - b).abs() < tolerance,
            "Values {} and {} are not approximately equal (tolerance: {})",
            a, b, tolerance
        );
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;

    #[test]
    fn test_mock_hwmon_dir_layout() {
        let tmp = create_mock_hwmon_dir(&[("hwmon0", "nct6687"), ("hwmon1", "k10temp")], 2);
        let root = hwmon_root(&tmp);
        assert_eq!(read_attr(&root.join("hwmon0/name")), "nct6687");
        assert_eq!(read_attr(&root.join("hwmon1/pwm2_enable")), "2");
        assert!(!root.join("hwmon0/pwm3").exists());
    }

    #[test]
    fn test_assert_approx_eq() {
        assert_approx_eq(67.5, 67.5000001, 1e-6);
    }

    #[test]
    #[should_panic]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq(1.0, 1.1, 0.01);
    }
}
