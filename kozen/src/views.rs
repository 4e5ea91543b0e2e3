//! HTML view rendering.
//!
//! Templates are embedded at compile time and rendered with minijinja. Each
//! view accepts an optional `{username, error, message}` context; the `.html`
//! template names keep minijinja's HTML auto-escaping active.

use axum::response::Html;
use minijinja::Environment;

use crate::errors::{Error, Result};

/// Embedded template environment.
#[derive(Debug)]
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();

        for (name, source) in [
            ("login.html", include_str!("../templates/login.html")),
            ("signup.html", include_str!("../templates/signup.html")),
            ("home.html", include_str!("../templates/home.html")),
            ("error.html", include_str!("../templates/error.html")),
            ("not_found.html", include_str!("../templates/not_found.html")),
        ] {
            env.add_template(name, source).map_err(|e| Error::Internal {
                operation: format!("register template {name}: {e}"),
            })?;
        }

        Ok(Self { env })
    }

    /// Render a view with the given context.
    pub fn render(&self, name: &str, ctx: minijinja::Value) -> Result<Html<String>> {
        let template = self.env.get_template(name).map_err(|e| Error::Internal {
            operation: format!("load template {name}: {e}"),
        })?;

        let html = template.render(ctx).map_err(|e| Error::Internal {
            operation: format!("render template {name}: {e}"),
        })?;

        Ok(Html(html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_all_views_render() {
        let views = Views::new().unwrap();

        for name in ["login.html", "signup.html", "home.html", "error.html", "not_found.html"] {
            let html = views.render(name, context! {}).unwrap();
            assert!(html.0.contains("<!DOCTYPE html>"), "{name} should be a full page");
        }
    }

    #[test]
    fn test_login_renders_error_banner() {
        let views = Views::new().unwrap();

        let without = views.render("login.html", context! {}).unwrap();
        assert!(!without.0.contains("class=\"error\""));

        let with = views.render("login.html", context! { error => "Invalid username or password" }).unwrap();
        assert!(with.0.contains("Invalid username or password"));
    }

    #[test]
    fn test_home_renders_username() {
        let views = Views::new().unwrap();
        let html = views.render("home.html", context! { username => "alice" }).unwrap();
        assert!(html.0.contains("alice"));
    }

    #[test]
    fn test_unknown_template_is_internal_error() {
        let views = Views::new().unwrap();
        assert!(views.render("nope.html", context! {}).is_err());
    }
}
