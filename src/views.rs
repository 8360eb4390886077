use axum::response::Html;
use std::sync::Arc;
use tera::{Context, Tera};

use crate::auth::SessionUser;

// Embedded at compile time.
const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("upload_notes.html", include_str!("../templates/upload_notes.html")),
    ("view_notes.html", include_str!("../templates/view_notes.html")),
    ("upload_video.html", include_str!("../templates/upload_video.html")),
    ("view_videos.html", include_str!("../templates/view_videos.html")),
    ("create_quiz.html", include_str!("../templates/create_quiz.html")),
    ("take_quiz.html", include_str!("../templates/take_quiz.html")),
    ("view_grades.html", include_str!("../templates/view_grades.html")),
    ("view_courses.html", include_str!("../templates/view_courses.html")),
    ("my_courses.html", include_str!("../templates/my_courses.html")),
];

/// Views
///
/// The page renderer. Every page gets the current session user as `user`
/// (`null` when anonymous), so the shared layout can show the right navigation.
#[derive(Clone)]
pub struct Views {
    tera: Arc<Tera>,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    pub fn render(
        &self,
        template: &str,
        user: Option<&SessionUser>,
        mut context: Context,
    ) -> Result<Html<String>, tera::Error> {
        context.insert("user", &user);
        self.tera.render(template, &context).map(Html)
    }

    /// Renders a page that needs nothing beyond the session user.
    pub fn page(&self, template: &str, user: Option<&SessionUser>) -> Result<Html<String>, tera::Error> {
        self.render(template, user, Context::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn pages_escape_user_content() {
        let views = Views::new().unwrap();
        let user = SessionUser {
            id: 1,
            role: Role::Student,
            email: "<script>@x.io".to_string(),
        };

        let Html(page) = views.page("dashboard.html", Some(&user)).unwrap();

        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn anonymous_layout_offers_login() {
        let Html(page) = Views::new().unwrap().page("home.html", None).unwrap();
        assert!(page.contains("Log in"));
    }
}
