//! Diagnostic dump of the unit registry.

use std::fmt::Write as _;

use photobatch_core::{UnitKind, UnitRegistry};

/// Labels of every registered unit, reconstruction units first.
///
/// With `verbose`, each label is followed by its status and photo count.
pub fn format_units(registry: &UnitRegistry, verbose: bool) -> String {
    let mut out = String::new();
    for (heading, kind) in [
        ("IN RECONSTRUCTION:", UnitKind::Reconstruction),
        ("IN TEXTURE:", UnitKind::Texture),
    ] {
        out.push_str(heading);
        out.push('\n');
        for (_, unit) in registry.iter(kind) {
            if verbose {
                let _ = writeln!(
                    out,
                    "{}\t{}\t{} photos",
                    unit.label(),
                    unit.status,
                    unit.image_count
                );
            } else {
                let _ = writeln!(out, "{}", unit.label());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use photobatch_core::{ProcessingUnit, UnitHandle, UnitStatus};

    fn registry() -> UnitRegistry {
        let mut registry = UnitRegistry::new();
        let mut recon =
            ProcessingUnit::new("/d/A_2/", UnitKind::Reconstruction, UnitHandle::new("u0"));
        recon.status = UnitStatus::Reconstructed;
        recon.image_count = 3;
        registry.insert(recon).unwrap();
        registry
            .insert(ProcessingUnit::new(
                "/d/A_1/",
                UnitKind::Texture,
                UnitHandle::new("u1"),
            ))
            .unwrap();
        registry
    }

    #[test]
    fn lists_labels_per_registry() {
        assert_eq!(
            format_units(&registry(), false),
            "IN RECONSTRUCTION:\n/d/A_2/\nIN TEXTURE:\n/d/A_1/\n"
        );
    }

    #[test]
    fn verbose_adds_status_and_count() {
        let text = format_units(&registry(), true);
        assert!(text.contains("/d/A_2/\treconstructed\t3 photos"));
        assert!(text.contains("/d/A_1/\tcreated\t0 photos"));
    }

    #[test]
    fn empty_registry_prints_headings() {
        assert_eq!(
            format_units(&UnitRegistry::new(), false),
            "IN RECONSTRUCTION:\nIN TEXTURE:\n"
        );
    }
}
