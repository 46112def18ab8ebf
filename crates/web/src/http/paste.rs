use std::time::Instant;

use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use berth_contracts::{Paste, PolicyScope, Viewer};
use berth_policy::Capability;
use berth_store::NewPaste;
use serde::Deserialize;
use tracing::Instrument;

use super::viewer::extract_viewer;
use super::{ApiError, AppState, not_found, rate_limited, store_unavailable};
use crate::views::{
    Crumb, ErrorBannerView, FormField, FormView, PageResponse, PropertyListView, PropertyValue,
    SelectOption, SourceView, SubmitControl, Widget,
};

/// The two shapes a paste edit request can take, resolved once per
/// request. Each variant carries only the record that exists in that
/// shape: a draft may have a fork parent, an edit has the stored paste.
#[derive(Debug)]
enum EditMode {
    CreateDraft { parent: Option<Paste> },
    EditExisting { paste: Paste },
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateParams {
    #[serde(default)]
    parent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PasteForm {
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Best-effort fork parent resolution: an absent, unparseable, missing,
/// or invisible parent silently yields `None` rather than an error.
async fn resolve_parent(
    state: &AppState,
    viewer: &Viewer,
    raw: Option<&str>,
) -> Result<Option<Paste>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let Ok(parent_id) = raw.parse::<i64>() else {
        return Ok(None);
    };

    state
        .store
        .paste_for_viewer(viewer, parent_id, &[Capability::View])
        .await
        .map_err(store_unavailable)
}

fn fork_title(parent: &Paste) -> String {
    if parent.title.is_empty() {
        format!("Fork of {}", parent.display_name())
    } else {
        format!("Fork of {}", parent.title)
    }
}

pub(super) async fn create_form(
    State(state): State<AppState>,
    Query(params): Query<CreateParams>,
    headers: HeaderMap,
) -> Result<Json<PageResponse>, ApiError> {
    let started = Instant::now();
    let span = tracing::info_span!(
        "paste.edit",
        mode = "create",
        viewer_id = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let viewer = extract_viewer(&state, &headers).await?;
        tracing::Span::current().record("viewer_id", viewer.id);

        let parent_raw = params.parent.clone().unwrap_or_default();
        let parent = resolve_parent(&state, &viewer, params.parent.as_deref()).await?;

        let (title, language, text) = match &parent {
            Some(parent) => {
                let text = match parent.file_id {
                    Some(file_id) => state
                        .store
                        .file_by_id(file_id)
                        .await
                        .map_err(store_unavailable)?
                        .map(|blob| String::from_utf8_lossy(&blob.data).into_owned())
                        .unwrap_or_default(),
                    None => String::new(),
                };
                (fork_title(parent), parent.language.clone(), text)
            }
            None => (String::new(), String::new(), String::new()),
        };

        let mode = EditMode::CreateDraft { parent };
        Ok(Json(build_form_page(
            &mode,
            &parent_raw,
            &title,
            &language,
            &text,
            None,
            &[],
            &state.config.paste_languages,
        )))
    }
    .instrument(span.clone())
    .await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err((status, _)) => *status,
    };
    span.record("latency_ms", started.elapsed().as_millis() as u64);
    span.record("outcome", if status.is_success() { "ok" } else { "error" });
    crate::metrics::observe_http_request("/paste/create", "GET", status.as_u16(), started.elapsed());

    result
}

pub(super) async fn create_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<PasteForm>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let span = tracing::info_span!(
        "paste.edit",
        mode = "create",
        viewer_id = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let viewer = extract_viewer(&state, &headers).await?;
        tracing::Span::current().record("viewer_id", viewer.id);

        if !state
            .write_limiter
            .allow(viewer.id, state.config.rate_limit_writes_per_window)
        {
            return Err(rate_limited());
        }

        let parent_raw = form.parent.clone().unwrap_or_default();
        let parent = resolve_parent(&state, &viewer, form.parent.as_deref()).await?;

        let title = form.title.unwrap_or_default();
        let language = form.language.unwrap_or_default();
        let text = form.text.unwrap_or_default();

        // Create mode is the only path that accepts content, and content
        // is required; nothing persists on a validation miss.
        if text.is_empty() {
            let mode = EditMode::CreateDraft { parent };
            let page = build_form_page(
                &mode,
                &parent_raw,
                &title,
                &language,
                &text,
                Some("Required"),
                &["The paste may not be blank.".to_string()],
                &state.config.paste_languages,
            );
            return Ok((StatusCode::OK, Json(page)).into_response());
        }

        let file_name = if title.is_empty() { "paste" } else { &title };
        let file_id = state
            .store
            .create_file(file_name, viewer.id, text.as_bytes())
            .await
            .map_err(store_unavailable)?;

        let paste_id = state
            .store
            .create_paste(NewPaste {
                title: &title,
                language: &language,
                file_id,
                author_id: viewer.id,
                parent_id: parent.as_ref().map(|p| p.id),
                view_scope: PolicyScope::Anyone,
                edit_scope: PolicyScope::OwnerOnly,
            })
            .await
            .map_err(store_unavailable)?;

        crate::metrics::inc_paste_save("create");
        tracing::info!(paste_id, viewer_id = viewer.id, "paste.created");

        Ok(Redirect::to(&format!("/paste/{}", paste_id)).into_response())
    }
    .instrument(span.clone())
    .await;

    let status = match &result {
        Ok(response) => response.status(),
        Err((status, _)) => *status,
    };
    span.record("latency_ms", started.elapsed().as_millis() as u64);
    span.record("outcome", if status.is_client_error() || status.is_server_error() { "error" } else { "ok" });
    crate::metrics::observe_http_request("/paste/create", "POST", status.as_u16(), started.elapsed());

    result
}

pub(super) async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<PageResponse>, ApiError> {
    let started = Instant::now();
    let span = tracing::info_span!(
        "paste.edit",
        mode = "edit",
        paste_id = id,
        viewer_id = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let viewer = extract_viewer(&state, &headers).await?;
        tracing::Span::current().record("viewer_id", viewer.id);

        let paste = state
            .store
            .paste_for_viewer(&viewer, id, &[Capability::View, Capability::Edit])
            .await
            .map_err(store_unavailable)?
            .ok_or_else(|| {
                crate::metrics::inc_record_not_found("paste");
                not_found()
            })?;

        let title = paste.title.clone();
        let language = paste.language.clone();
        let mode = EditMode::EditExisting { paste };

        Ok(Json(build_form_page(
            &mode,
            "",
            &title,
            &language,
            "",
            None,
            &[],
            &state.config.paste_languages,
        )))
    }
    .instrument(span.clone())
    .await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err((status, _)) => *status,
    };
    span.record("latency_ms", started.elapsed().as_millis() as u64);
    span.record("outcome", if status.is_success() { "ok" } else { "error" });
    crate::metrics::observe_http_request(
        "/paste/{id}/edit",
        "GET",
        status.as_u16(),
        started.elapsed(),
    );

    result
}

pub(super) async fn edit_submit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Form(form): Form<PasteForm>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let span = tracing::info_span!(
        "paste.edit",
        mode = "edit",
        paste_id = id,
        viewer_id = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let viewer = extract_viewer(&state, &headers).await?;
        tracing::Span::current().record("viewer_id", viewer.id);

        if !state
            .write_limiter
            .allow(viewer.id, state.config.rate_limit_writes_per_window)
        {
            return Err(rate_limited());
        }

        let paste = state
            .store
            .paste_for_viewer(&viewer, id, &[Capability::View, Capability::Edit])
            .await
            .map_err(store_unavailable)?
            .ok_or_else(|| {
                crate::metrics::inc_record_not_found("paste");
                not_found()
            })?;

        // Content is fixed at creation; edit mode only touches metadata.
        let title = form.title.unwrap_or_default();
        let language = form.language.unwrap_or_default();
        state
            .store
            .update_paste_metadata(paste.id, &title, &language)
            .await
            .map_err(store_unavailable)?;

        crate::metrics::inc_paste_save("edit");
        tracing::info!(paste_id = paste.id, viewer_id = viewer.id, "paste.updated");

        Ok(Redirect::to(&paste.uri()).into_response())
    }
    .instrument(span.clone())
    .await;

    let status = match &result {
        Ok(response) => response.status(),
        Err((status, _)) => *status,
    };
    span.record("latency_ms", started.elapsed().as_millis() as u64);
    span.record(
        "outcome",
        if status.is_redirection() { "ok" } else { "error" },
    );
    crate::metrics::observe_http_request(
        "/paste/{id}/edit",
        "POST",
        status.as_u16(),
        started.elapsed(),
    );

    result
}

pub(super) async fn paste_view(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<PageResponse>, ApiError> {
    let started = Instant::now();
    let span = tracing::info_span!(
        "paste.view",
        paste_id = id,
        viewer_id = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let viewer = extract_viewer(&state, &headers).await?;
        tracing::Span::current().record("viewer_id", viewer.id);

        let paste = state
            .store
            .paste_for_viewer(&viewer, id, &[Capability::View])
            .await
            .map_err(store_unavailable)?
            .ok_or_else(|| {
                crate::metrics::inc_record_not_found("paste");
                not_found()
            })?;

        let author = state
            .store
            .viewer_by_id(paste.author_id)
            .await
            .map_err(store_unavailable)?;

        let text = match paste.file_id {
            Some(file_id) => state
                .store
                .file_by_id(file_id)
                .await
                .map_err(store_unavailable)?
                .map(|blob| String::from_utf8_lossy(&blob.data).into_owned())
                .unwrap_or_default(),
            None => String::new(),
        };

        Ok(Json(build_paste_page(&paste, author.as_ref(), &text)))
    }
    .instrument(span.clone())
    .await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err((status, _)) => *status,
    };
    span.record("latency_ms", started.elapsed().as_millis() as u64);
    span.record("outcome", if status.is_success() { "ok" } else { "error" });
    crate::metrics::observe_http_request("/paste/{id}", "GET", status.as_u16(), started.elapsed());

    result
}

#[allow(clippy::too_many_arguments)]
fn build_form_page(
    mode: &EditMode,
    parent_raw: &str,
    title: &str,
    language: &str,
    text: &str,
    text_error: Option<&str>,
    page_errors: &[String],
    languages: &[String],
) -> PageResponse {
    let (page_title, action, submit_label, cancel_uri) = match mode {
        EditMode::CreateDraft { .. } => (
            "Create Paste".to_string(),
            "/paste/create".to_string(),
            "Create Paste",
            None,
        ),
        EditMode::EditExisting { paste } => (
            format!("Edit {}", paste.display_name()),
            format!("{}/edit", paste.uri()),
            "Save Paste",
            Some(paste.uri()),
        ),
    };

    let mut fields = vec![
        FormField::Hidden {
            name: "parent".to_string(),
            value: parent_raw.to_string(),
        },
        FormField::Text {
            name: "title".to_string(),
            label: "Title".to_string(),
            value: title.to_string(),
        },
        FormField::Select {
            name: "language".to_string(),
            label: "Language".to_string(),
            value: language.to_string(),
            options: language_options(languages),
        },
    ];
    if matches!(mode, EditMode::CreateDraft { .. }) {
        fields.push(FormField::TextArea {
            name: "text".to_string(),
            label: "Text".to_string(),
            value: text.to_string(),
            error: text_error.map(str::to_string),
        });
    }

    let mut content = Vec::new();
    if !page_errors.is_empty() {
        content.push(Widget::ErrorBanner(ErrorBannerView {
            title: "Form Errors".to_string(),
            errors: page_errors.to_vec(),
        }));
    }
    content.push(Widget::Form(FormView {
        action,
        fields,
        submit: SubmitControl {
            label: submit_label.to_string(),
            cancel_uri,
        },
    }));

    PageResponse {
        title: page_title.clone(),
        crumbs: vec![
            Crumb {
                label: "Pastes".to_string(),
                href: "/paste".to_string(),
            },
            Crumb {
                label: page_title,
                href: String::new(),
            },
        ],
        content,
    }
}

fn language_options(languages: &[String]) -> Vec<SelectOption> {
    let mut options = vec![SelectOption {
        value: String::new(),
        label: "(Auto-Detect)".to_string(),
    }];
    options.extend(languages.iter().map(|language| SelectOption {
        value: language.clone(),
        label: language.clone(),
    }));
    options
}

fn build_paste_page(paste: &Paste, author: Option<&Viewer>, text: &str) -> PageResponse {
    let title = paste.display_name();

    let author_value = match author {
        Some(author) => PropertyValue::Text(author.username.clone()),
        None => PropertyValue::Placeholder("Unknown Author".to_string()),
    };
    let language_value = if paste.language.is_empty() {
        PropertyValue::Placeholder("(Auto-Detect)".to_string())
    } else {
        PropertyValue::Text(paste.language.clone())
    };

    let mut properties = PropertyListView::new()
        .property("Author", author_value)
        .property("Language", language_value);
    if let Some(parent_id) = paste.parent_id {
        properties = properties.property(
            "Forked From",
            PropertyValue::Link {
                label: format!("Paste {}", parent_id),
                href: format!("/paste/{}", parent_id),
            },
        );
    }

    PageResponse {
        title: title.clone(),
        crumbs: vec![
            Crumb {
                label: "Pastes".to_string(),
                href: "/paste".to_string(),
            },
            Crumb {
                label: title,
                href: paste.uri(),
            },
        ],
        content: vec![
            Widget::PropertyList(properties),
            Widget::Source(SourceView {
                name: paste.title.clone(),
                text: text.to_string(),
            }),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paste(id: i64, title: &str, language: &str) -> Paste {
        Paste {
            id,
            title: title.to_string(),
            language: language.to_string(),
            file_id: Some(1),
            author_id: 10,
            parent_id: None,
            view_scope: PolicyScope::Anyone,
            edit_scope: PolicyScope::OwnerOnly,
        }
    }

    fn languages() -> Vec<String> {
        vec!["python".to_string(), "rust".to_string()]
    }

    fn form_view(page: &PageResponse) -> &FormView {
        page.content
            .iter()
            .find_map(|widget| match widget {
                Widget::Form(form) => Some(form),
                _ => None,
            })
            .expect("page should contain a form")
    }

    #[test]
    fn fork_title_uses_the_parent_title() {
        assert_eq!(fork_title(&paste(5, "Foo", "python")), "Fork of Foo");
        assert_eq!(fork_title(&paste(5, "", "python")), "Fork of Paste 5");
    }

    #[test]
    fn create_form_carries_a_textarea_and_hidden_parent() {
        let mode = EditMode::CreateDraft { parent: None };
        let page = build_form_page(&mode, "5", "Fork of Foo", "python", "body", None, &[], &languages());

        assert_eq!(page.title, "Create Paste");
        let form = form_view(&page);
        assert_eq!(form.action, "/paste/create");
        assert_eq!(form.submit.label, "Create Paste");
        assert_eq!(form.submit.cancel_uri, None);

        assert!(matches!(
            &form.fields[0],
            FormField::Hidden { name, value } if name == "parent" && value == "5"
        ));
        assert!(matches!(
            &form.fields[1],
            FormField::Text { value, .. } if value == "Fork of Foo"
        ));
        assert!(matches!(
            &form.fields[2],
            FormField::Select { value, options, .. }
                if value == "python" && options[0].value.is_empty()
        ));
        assert!(matches!(
            &form.fields[3],
            FormField::TextArea { value, error, .. } if value == "body" && error.is_none()
        ));
    }

    #[test]
    fn edit_form_has_no_textarea_and_links_cancel_to_the_paste() {
        let mode = EditMode::EditExisting {
            paste: paste(7, "Foo", "python"),
        };
        let page = build_form_page(&mode, "", "Foo", "python", "", None, &[], &languages());

        assert_eq!(page.title, "Edit Paste 7: Foo");
        let form = form_view(&page);
        assert_eq!(form.action, "/paste/7/edit");
        assert_eq!(form.submit.label, "Save Paste");
        assert_eq!(form.submit.cancel_uri, Some("/paste/7".to_string()));
        assert_eq!(form.fields.len(), 3);
        assert!(
            !form
                .fields
                .iter()
                .any(|field| matches!(field, FormField::TextArea { .. }))
        );
    }

    #[test]
    fn validation_errors_render_a_banner_and_field_error() {
        let mode = EditMode::CreateDraft { parent: None };
        let page = build_form_page(
            &mode,
            "",
            "Title",
            "",
            "",
            Some("Required"),
            &["The paste may not be blank.".to_string()],
            &languages(),
        );

        let Widget::ErrorBanner(banner) = &page.content[0] else {
            panic!("first widget should be the error banner");
        };
        assert_eq!(banner.errors, vec!["The paste may not be blank."]);

        let form = form_view(&page);
        assert!(matches!(
            &form.fields[3],
            FormField::TextArea { error: Some(error), .. } if error == "Required"
        ));
    }

    #[test]
    fn language_options_lead_with_auto_detect() {
        let options = language_options(&languages());
        assert_eq!(options[0].value, "");
        assert_eq!(options[0].label, "(Auto-Detect)");
        assert_eq!(options[1].value, "python");
        assert_eq!(options[2].value, "rust");
    }

    #[test]
    fn paste_page_lists_fork_lineage_only_when_present() {
        let plain = paste(7, "Foo", "python");
        let page = build_paste_page(&plain, None, "body");
        let Widget::PropertyList(properties) = &page.content[0] else {
            panic!("first widget should be the property list");
        };
        assert!(!properties.properties.iter().any(|p| p.label == "Forked From"));

        let mut forked = paste(8, "Fork of Foo", "python");
        forked.parent_id = Some(7);
        let page = build_paste_page(&forked, None, "body");
        let Widget::PropertyList(properties) = &page.content[0] else {
            panic!("first widget should be the property list");
        };
        let lineage = properties
            .properties
            .iter()
            .find(|p| p.label == "Forked From")
            .expect("forked paste should list its parent");
        assert_eq!(
            lineage.value,
            PropertyValue::Link {
                label: "Paste 7".to_string(),
                href: "/paste/7".to_string(),
            }
        );
    }
}
