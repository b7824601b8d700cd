//! Xorg keyboard file editing.

mod common;

use common::Fixture;
use settingsd_config::xorg::LineKind;
use settingsd_config::{Error, XkbSettings, XorgErrorKind, XorgKeyboardConfig};

fn doc(source: &str) -> XorgKeyboardConfig {
    XorgKeyboardConfig::from_source("/test/30-keyboard.conf", source).expect("parse failed")
}

fn xkb(
    layout: Option<&str>,
    model: Option<&str>,
    variant: Option<&str>,
    options: Option<&str>,
) -> XkbSettings {
    XkbSettings {
        layout: layout.map(str::to_string),
        model: model.map(str::to_string),
        variant: variant.map(str::to_string),
        options: options.map(str::to_string),
    }
}

const GENERATED: &str = "\
Section \"InputClass\"
        Identifier \"keyboard-all\"
        MatchIsKeyboard \"on\"
        Option \"XkbLayout\" \"us\"
EndSection
";

// -----------------------------------------------------------
// Reading.
// -----------------------------------------------------------

#[test]
fn absent_file_has_no_settings() {
    let fx = Fixture::new();
    let d = XorgKeyboardConfig::parse(fx.path("30-keyboard.conf")).expect("parse");
    assert!(d.lines().is_empty());
    assert_eq!(d.get_xkb(), XkbSettings::default());
}

#[test]
fn last_occurrence_of_option_wins() {
    let d = doc(
        "Section \"InputClass\"\n\
         MatchIsKeyboard \"true\"\n\
         Option \"XkbLayout\" \"us\"\n\
         Option \"XkbLayout\" \"de\"\n\
         EndSection\n",
    );
    assert_eq!(d.get_xkb().layout.as_deref(), Some("de"));
}

#[test]
fn match_is_keyboard_false_does_not_count() {
    let d = doc(
        "Section \"InputClass\"\n\
         MatchIsKeyboard \"off\"\n\
         Option \"XkbLayout\" \"us\"\n\
         EndSection\n",
    );
    assert!(!d.has_keyboard_section());
    assert_eq!(d.get_xkb().layout, None);
}

#[test]
fn keyboard_match_outside_input_class_is_ignored() {
    let d = doc(
        "Section \"InputDevice\"\n\
         MatchIsKeyboard\n\
         Option \"XkbLayout\" \"fr\"\n\
         EndSection\n",
    );
    assert!(!d.has_keyboard_section());
}

#[test]
fn lines_are_classified() {
    let d = doc(GENERATED);
    let kinds: Vec<_> = d.lines().iter().map(|l| &l.kind).collect();
    assert!(matches!(kinds[0], LineKind::SectionStart(_)));
    assert_eq!(kinds[1], &LineKind::Unknown);
    assert_eq!(kinds[2], &LineKind::MatchIsKeyboard);
    assert!(matches!(kinds[3], LineKind::Xkb { value, .. } if value == "us"));
    assert_eq!(kinds[4], &LineKind::EndSection);
}

// -----------------------------------------------------------
// Writing.
// -----------------------------------------------------------

#[test]
fn synthesized_section_for_file_without_input_class() {
    let mut d = doc("# no keyboard here\n");
    d.set_xkb(&xkb(Some("us"), None, None, None)).expect("set");
    assert_eq!(
        d.serialize(),
        "# no keyboard here\n\
         Section \"InputClass\"\n\
         \x20       Identifier \"keyboard-all\"\n\
         \x20       MatchIsKeyboard \"on\"\n\
         \x20       Option \"XkbLayout\" \"us\"\n\
         EndSection\n"
    );
}

#[test]
fn set_all_none_changes_nothing() {
    let mut d = doc(GENERATED);
    d.set_xkb(&XkbSettings::default()).expect("set");
    assert_eq!(d.serialize(), GENERATED);
}

#[test]
fn set_all_none_on_empty_file_adds_bare_section() {
    let mut d = doc("");
    d.set_xkb(&XkbSettings::default()).expect("set");
    assert!(d.has_keyboard_section());
    assert_eq!(d.lines().len(), 4);
}

#[test]
fn set_rewrites_every_line_of_a_kind() {
    let mut d = doc(
        "Section \"InputClass\"\n\
         MatchIsKeyboard\n\
         Option \"XkbLayout\" \"us\"\n\
         Option \"XkbLayout\" \"de\"\n\
         EndSection\n",
    );
    d.set_xkb(&xkb(Some("fr"), None, None, None)).expect("set");
    assert_eq!(d.serialize().matches("\"fr\"").count(), 2);
    assert_eq!(d.get_xkb().layout.as_deref(), Some("fr"));
}

#[test]
fn delete_every_line_of_a_kind() {
    let mut d = doc(
        "Section \"InputClass\"\n\
         MatchIsKeyboard\n\
         Option \"XkbOptions\" \"a\"\n\
         Option \"XkbOptions\" \"b\"\n\
         EndSection\n",
    );
    d.set_xkb(&xkb(None, None, None, Some(""))).expect("set");
    assert_eq!(d.serialize(), "Section \"InputClass\"\nMatchIsKeyboard\nEndSection\n");
}

#[test]
fn empty_value_for_absent_option_inserts_nothing() {
    let mut d = doc(GENERATED);
    d.set_xkb(&xkb(None, Some(""), None, None)).expect("set");
    assert_eq!(d.serialize(), GENERATED);
}

#[test]
fn only_keyboard_section_is_edited() {
    let source = "\
Section \"InputClass\"
\tIdentifier \"touchpad\"
\tOption \"XkbLayout\" \"keep\"
EndSection
Section \"InputClass\"
\tMatchIsKeyboard \"on\"
\tOption \"XkbLayout\" \"us\"
EndSection
Section \"Device\"
EndSection
";
    let mut d = doc(source);
    d.set_xkb(&xkb(Some("de"), Some("pc105"), None, None)).expect("set");
    assert_eq!(
        d.serialize(),
        "\
Section \"InputClass\"
\tIdentifier \"touchpad\"
\tOption \"XkbLayout\" \"keep\"
EndSection
Section \"InputClass\"
\tMatchIsKeyboard \"on\"
\tOption \"XkbLayout\" \"de\"
        Option \"XkbModel\" \"pc105\"
EndSection
Section \"Device\"
EndSection
"
    );
}

#[test]
fn line_break_in_value_is_refused() {
    let mut d = doc(GENERATED);
    assert!(matches!(
        d.set_xkb(&xkb(None, None, Some("a\nb"), None)),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(d.serialize(), GENERATED);
}

#[test]
fn keyword_prefix_is_not_a_section_end() {
    let d = doc(
        "Section \"InputClass\"\n\
         MatchIsKeyboard\n\
         EndSectionFoo \"x\"\n\
         EndSection\n",
    );
    assert_eq!(d.lines()[2].kind, LineKind::Unknown);
    assert!(d.has_keyboard_section());
}

#[test]
fn save_and_reload() {
    let fx = Fixture::new();
    let path = fx.write("30-keyboard.conf", GENERATED);
    let mut d = XorgKeyboardConfig::parse(&path).expect("parse");
    d.set_xkb(&xkb(Some("de"), None, Some("nodeadkeys"), None)).expect("set");
    d.save().expect("save");

    let reloaded = XorgKeyboardConfig::parse(&path).expect("reparse");
    assert_eq!(reloaded.get_xkb(), xkb(Some("de"), None, Some("nodeadkeys"), None));
    assert_eq!(fx.entries(), ["30-keyboard.conf"]);
}

// -----------------------------------------------------------
// Errors.
// -----------------------------------------------------------

fn error_kind(source: &str) -> (XorgErrorKind, usize) {
    match XorgKeyboardConfig::from_source("/test/x.conf", source) {
        Err(Error::Xorg { source, .. }) => (source.kind, source.line),
        other => panic!("expected Xorg error, got {other:?}"),
    }
}

#[test]
fn error_end_section_without_section() {
    assert_eq!(
        error_kind("# c\nEndSection\n"),
        (XorgErrorKind::OutsideSection, 2)
    );
}

#[test]
fn error_nested_section() {
    assert_eq!(
        error_kind("Section \"InputClass\"\n  Section \"Other\"\n"),
        (XorgErrorKind::NestedSection, 2)
    );
}

#[test]
fn error_unterminated_section() {
    assert_eq!(
        error_kind("Section \"InputClass\"\nMatchIsKeyboard\n"),
        (XorgErrorKind::UnterminatedSection, 2)
    );
}

#[test]
fn error_message_names_file_and_line() {
    let err = XorgKeyboardConfig::from_source("/etc/x.conf", "EndSection\n").unwrap_err();
    assert_eq!(err.to_string(), "/etc/x.conf: statement outside of any section at line 1");
}
