//! XML documents generated for a feature module.

/// Resource values for the feature module; it only needs a title string.
pub const FEATURE_STRINGS_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <string name="app_name">PostSplitLoading</string>
</resources>
"#;

/// True for names usable as an application id segment or module name.
pub fn is_valid_identifier(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('.')
        && !value.ends_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Manifest of a feature module of `package` named `module`.
///
/// Both values are interpolated verbatim; callers check them with
/// [`is_valid_identifier`] first.
pub fn feature_manifest(package: &str, module: &str, instant: bool) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:dist="http://schemas.android.com/apk/distribution"
    package="{package}"
    split="{module}">
    <dist:module
        dist:instant="{instant}"
        dist:onDemand="true"
        dist:title="@string/app_name">
        <dist:fusing dist:include="true" />
    </dist:module>
    <application android:hasCode="false" />
</manifest>
"#
    )
}
