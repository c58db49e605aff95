use script_doc::{
    diff, diff_with_options, format_json, format_summary, format_text, parse, DiffEntry,
    DiffOptions, DiffSummary,
};

const OLD: &str = "#!/bin/sh\n# >>> header\npass=0\n# <<< header\n# >>> web_installed\nout=$(dpkg-query -W nginx)\n# <<< web_installed\n# >>> web_running\nsystemctl is-active nginx\n# <<< web_running\n";
const NEW: &str = "#!/bin/sh\n# >>> header\npass=0\n# <<< header\n# >>> web_installed\nout=$(dpkg-query -W nginx-full)\n# <<< web_installed\n# >>> web_enabled\nsystemctl is-enabled nginx\n# <<< web_enabled\n";

#[test]
fn diff_reports_one_entry_per_changed_added_and_removed_unit() {
    let left = parse(OLD.as_bytes()).expect("left");
    let right = parse(NEW.as_bytes()).expect("right");

    let entries = diff(&left, &right);

    assert_eq!(entries.len(), 3);
    assert!(entries.iter().any(|e| matches!(
        e,
        DiffEntry::Changed { path, removed, added, .. }
            if path == "script.web_installed"
                && removed == &["out=$(dpkg-query -W nginx)".to_string()]
                && added == &["out=$(dpkg-query -W nginx-full)".to_string()]
    )));
    assert!(entries.iter().any(|e| matches!(
        e,
        DiffEntry::Removed { path, body, .. }
            if path == "script.web_running" && body == &["systemctl is-active nginx".to_string()]
    )));
    assert!(entries
        .iter()
        .any(|e| matches!(e, DiffEntry::Added { path, .. } if path == "script.web_enabled")));

    let text = format_text(&entries);
    let json = format_json(&entries);
    let summary = format_summary(&entries);
    assert!(text.contains("+ script.web_enabled (1 line)\n    + systemctl is-enabled nginx"));
    assert!(text.contains("~ script.web_installed\n    - out=$(dpkg-query -W nginx)\n"));
    assert!(json.contains("\"change\""));
    assert!(json.contains("\"summary\""));
    assert!(summary.contains("changed=1 removed=1 added=1"));
    assert!(summary.contains("lines=+2/-2"));
}

#[test]
fn ignored_sections_are_skipped() {
    let left = parse(OLD.as_bytes()).expect("left");
    let right = parse(NEW.as_bytes()).expect("right");
    let opts = DiffOptions {
        ignore_sections: vec!["web_installed".to_string()],
        ..DiffOptions::default()
    };

    let entries = diff_with_options(&left, &right, &opts);

    assert!(!entries.iter().any(|e| e.path().contains("web_installed")));
}

#[test]
fn identical_rows_only_when_requested() {
    let left = parse(OLD.as_bytes()).expect("left");
    assert!(diff(&left, &left).is_empty());

    let opts = DiffOptions {
        include_identical: true,
        ..DiffOptions::default()
    };
    let entries = diff_with_options(&left, &left, &opts);
    assert!(entries
        .iter()
        .all(|e| matches!(e, DiffEntry::Unchanged { .. })));
    assert_eq!(entries.len(), 3);
    assert!(DiffSummary::of(&entries).is_clean());
}
