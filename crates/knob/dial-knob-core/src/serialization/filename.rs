//! Frame-number patterns for file knobs that used to animate their file name.

/// Turn a concrete frame file name into a sequence pattern.
///
/// The last run of digits in the file stem becomes `#` padding: one `#` per digit when
/// the run is zero padded, a single `#` otherwise. Names without digits are returned
/// unchanged. Only the stem is searched, so extensions like `.mp4` are left alone.
///
/// ```
/// use dial_knob_core::serialization::legacy_filename_pattern;
/// assert_eq!(legacy_filename_pattern("shots/plate.0012.exr"), "shots/plate.####.exr");
/// assert_eq!(legacy_filename_pattern("render_12.png"), "render_#.png");
/// ```
pub fn legacy_filename_pattern(name: &str) -> String {
    let file_start = name.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let stem_end = match name[file_start..].rfind('.') {
        Some(0) | None => name.len(),
        Some(i) => file_start + i,
    };
    let stem = &name[..stem_end];
    let Some(last) = stem.rfind(|c: char| c.is_ascii_digit()) else {
        return name.to_string();
    };
    let end = last + 1;
    let start = stem[..end]
        .char_indices()
        .rfind(|(_, c)| !c.is_ascii_digit())
        .map_or(0, |(i, c)| i + c.len_utf8());
    let run = &stem[start..end];
    let padding = if run.len() > 1 && run.starts_with('0') {
        "#".repeat(run.len())
    } else {
        "#".to_string()
    };
    format!("{}{}{}", &name[..start], padding, &name[end..])
}

#[cfg(test)]
mod tests {
    use super::legacy_filename_pattern;

    #[test]
    fn padded_runs_keep_their_width() {
        assert_eq!(legacy_filename_pattern("a/b_0001.dpx"), "a/b_####.dpx");
    }

    #[test]
    fn only_the_last_run_changes() {
        assert_eq!(
            legacy_filename_pattern("take2/shot10_v3_45.exr"),
            "take2/shot10_v3_#.exr"
        );
    }

    #[test]
    fn names_without_digits_are_kept() {
        assert_eq!(legacy_filename_pattern("clip.mp4"), "clip.mp4");
        assert_eq!(legacy_filename_pattern(""), "");
    }

    #[test]
    fn non_ascii_before_the_digits() {
        assert_eq!(legacy_filename_pattern("plates/café1.exr"), "plates/café#.exr");
        assert_eq!(legacy_filename_pattern("ショット007.png"), "ショット###.png");
    }

    #[test]
    fn hidden_files_have_no_extension() {
        assert_eq!(legacy_filename_pattern(".cache12"), ".cache#");
    }
}
