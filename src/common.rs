use handlebars::{handlebars_helper, Handlebars};
use serde_json::Value;

use std::fs;
use std::io;
use std::path::Path;

/// Writes `value` as pretty JSON, creating parent directories as needed.
pub fn write_json_file(path: &Path, value: &Value) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)
}

pub fn get_handlebars() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);

    handlebars_helper!(exists: |v: Value| !v.is_null());
    handlebars.register_helper("exists", Box::new(exists));

    handlebars_helper!(upper: |s: String| s.to_uppercase());
    handlebars.register_helper("upper", Box::new(upper));

    handlebars
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handlebars_escapes_html() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template("Hello {{name}}", &json!({"name": "<b>Team</b>"}))
            .expect("This to render");
        assert_eq!(res, "Hello &lt;b&gt;Team&lt;/b&gt;");
    }

    #[test]
    fn handlebars_helpers() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template(
                "{{#if (exists inviter)}}{{upper inviter}}{{else}}someone{{/if}}",
                &json!({"inviter": "jane"}),
            )
            .expect("This to render");
        assert_eq!(res, "JANE");
    }

    #[test]
    fn write_json_file_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("schema.json");
        write_json_file(&path, &json!({"openapi": "3.0.0"})).unwrap();
        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["openapi"], "3.0.0");
    }
}
