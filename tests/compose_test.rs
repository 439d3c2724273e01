//! Tagged compositions: reuse one validator tree under different
//! configurations.

use pretty_assertions::assert_eq;

use trellis::prelude::*;

fn profile() -> Compose {
    Compose::new(
        Schema::new()
            .field("nickname", IsString::new().and(Len::range(3, 20).tag("nickname")))
            .field(
                "email",
                Match::pattern(r"^[^@\s]+@[^@\s]+$").tag("email"),
            ),
    )
}

#[test]
fn base_composition_behaves_like_the_tree() {
    let ctx = profile().context(record! {
        "nickname" => "bob",
        "email" => "bob@example.com",
    });
    assert!(ctx.result().is_ok());
}

#[test]
fn tagged_errors_are_rekeyed() {
    let ctx = profile().context(record! {
        "nickname" => "ab",
        "email" => "bob@example.com",
    });
    let err = ctx.result().unwrap_err();
    // The schema aggregate bubbles out untagged; the nickname error
    // inside carries the re-keyable code on its own context.
    assert_eq!(err.code, "fail");

    let nickname_err = &err.nested[0];
    assert_eq!(nickname_err.code, "min");
    assert_eq!(nickname_err.path.as_deref(), Some("/nickname"));
}

#[test]
fn overrides_reparameterize_without_touching_the_tree() {
    let strict = profile().with(Overrides::new().set("nickname_min", 6));
    let ctx = strict.context(record! {
        "nickname" => "bobby",
        "email" => "bob@example.com",
    });
    let err = ctx.result().unwrap_err();
    assert_eq!(err.nested[0].param("min"), Some("6"));

    // A fresh base instance still accepts the same input.
    let ctx = profile().context(record! {
        "nickname" => "bobby",
        "email" => "bob@example.com",
    });
    assert!(ctx.result().is_ok());
}

#[test]
fn stacked_overrides_compose() {
    let strict = profile().with(
        Overrides::new()
            .set("nickname_min", 6)
            .set("nickname_max", 8),
    );
    let ctx = strict.context(record! {
        "nickname" => "muchtoolongname",
        "email" => "bob@example.com",
    });
    let err = ctx.result().unwrap_err();
    assert_eq!(err.nested[0].param("max"), Some("8"));
}

#[test]
fn disabling_a_tag_skips_its_validator() {
    let relaxed = profile().with(Overrides::new().set("email", false));
    let ctx = relaxed.context(record! {
        "nickname" => "bob",
        "email" => "anything goes",
    });
    assert!(ctx.result().is_ok());
}

#[test]
fn disabled_by_default_until_enabled() {
    let tree = Len::min(5).tag("length").enabled(false);
    let compose = Compose::new(tree);
    assert!(compose.context("ab").result().is_ok());

    let tree = Len::min(5).tag("length").enabled(false);
    let compose = Compose::new(tree).with(Overrides::new().set("length", true));
    assert_eq!(compose.context("ab").result().unwrap_err().code, "length_min");
}

#[test]
fn replacement_swaps_the_tagged_validator() {
    let numeric = profile().replace("email", IsInt::convert());
    let ctx = numeric.context(record! {
        "nickname" => "bob",
        "email" => "12345",
    });
    let result = ctx.result().unwrap();
    assert_eq!(result.get("email"), Value::from(12345));
}

#[test]
fn rekeyed_message_overrides_apply_at_the_composition() {
    let compose = Compose::new(Len::range(3, 20).tag("nickname"))
        .message("nickname_min", "Nickname needs {min}+ characters");
    let err = compose.context("ab").result().unwrap_err();
    assert_eq!(err.code, "nickname_min");
    assert_eq!(
        err.message.as_deref(),
        Some("Nickname needs 3+ characters")
    );
}

#[test]
fn nested_compositions_keep_their_overrides_separate() {
    // The inner composition relaxes its own tag; the outer one tags the
    // whole inner composition and re-keys its errors.
    let inner = Compose::new(Len::range(3, 20).tag("length"))
        .with(Overrides::new().set("length_min", 2));
    let outer = Compose::new(inner.tag("name"));

    assert!(outer.context("ab").result().is_ok());

    let inner = Compose::new(Len::range(3, 20).tag("length"))
        .with(Overrides::new().set("length_min", 2));
    let outer = Compose::new(inner.tag("name"));
    let err = outer.context("a").result().unwrap_err();
    assert_eq!(err.code, "name_length_min");
}

#[test]
fn unknown_override_is_rejected_at_build_time() {
    let result = profile().try_with(Overrides::new().set("nichname_min", 6));
    assert!(matches!(result, Err(SetupError::UnknownTag(_))));
}

#[test]
fn unsupported_param_is_rejected_at_build_time() {
    let result = profile().try_with(Overrides::new().set("email_min", 6));
    assert!(matches!(result, Err(SetupError::UnsupportedParam { .. })));
}
