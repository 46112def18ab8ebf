use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use berth_contracts::{Lease, LeaseLog, Resource, Viewer};
use berth_policy::{Capability, has_capability};
use serde::Deserialize;
use tracing::Instrument;

use super::pager::OffsetPager;
use super::viewer::extract_viewer;
use super::{ApiError, AppState, json_error, not_found, rate_limited, store_unavailable};
use crate::views::{
    Action, ActionListView, Crumb, LogRow, LogTableView, PageResponse, PagerView,
    PropertyListView, PropertyValue, Widget, format_timestamp,
};

#[derive(Debug, Deserialize)]
pub(super) struct LeaseViewParams {
    #[serde(default)]
    offset: Option<i64>,
}

pub(super) async fn lease_view(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LeaseViewParams>,
    headers: HeaderMap,
) -> Result<Json<PageResponse>, ApiError> {
    let started = Instant::now();
    let span = tracing::info_span!(
        "lease.view",
        lease_id = id,
        viewer_id = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let viewer = extract_viewer(&state, &headers).await?;
        tracing::Span::current().record("viewer_id", viewer.id);

        let lease = state
            .store
            .lease_for_viewer(&viewer, id)
            .await
            .map_err(store_unavailable)?
            .ok_or_else(|| {
                crate::metrics::inc_record_not_found("lease");
                not_found()
            })?;

        let resource = match lease.resource_id {
            Some(resource_id) => state
                .store
                .resource_by_id(resource_id)
                .await
                .map_err(store_unavailable)?,
            None => None,
        };

        let pager = OffsetPager::new(
            lease.uri(),
            params.offset.unwrap_or(0),
            state.config.log_page_size,
        );
        let mut logs = state
            .store
            .lease_logs(lease.id, pager.offset(), pager.query_limit())
            .await
            .map_err(store_unavailable)?;
        let has_more = pager.trim_page(&mut logs);

        Ok(Json(build_lease_page(
            &viewer,
            &lease,
            resource.as_ref(),
            &logs,
            pager.view(has_more),
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
    crate::metrics::observe_http_request("/lease/{id}", "GET", status.as_u16(), started.elapsed());

    result
}

pub(super) async fn lease_release(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let span = tracing::info_span!(
        "lease.release",
        lease_id = id,
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

        let lease = state
            .store
            .lease_for_viewer(&viewer, id)
            .await
            .map_err(store_unavailable)?
            .ok_or_else(|| {
                crate::metrics::inc_record_not_found("lease");
                not_found()
            })?;

        if !lease.can_release() || !has_capability(&viewer, &lease, Capability::Edit) {
            return Err(json_error(
                StatusCode::FORBIDDEN,
                "ERR_RELEASE_DENIED",
                "lease cannot be released".to_string(),
            ));
        }

        state
            .store
            .release_lease(lease.id, &viewer.username)
            .await
            .map_err(store_unavailable)?;

        crate::metrics::inc_lease_release();
        tracing::info!(lease_id = lease.id, viewer_id = viewer.id, "lease.released");

        Ok(Redirect::to(&lease.uri()).into_response())
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
        "/lease/{id}/release",
        "POST",
        status.as_u16(),
        started.elapsed(),
    );

    result
}

fn build_lease_page(
    viewer: &Viewer,
    lease: &Lease,
    resource: Option<&Resource>,
    logs: &[LeaseLog],
    pager: PagerView,
) -> PageResponse {
    let title = format!("Lease {}", lease.id);

    let mut content = vec![Widget::PropertyList(lease_properties(lease, resource))];
    if let Some(attributes) = attribute_properties(lease) {
        content.push(Widget::PropertyList(attributes));
    }
    content.push(Widget::ActionList(release_actions(viewer, lease)));
    content.push(Widget::LogTable(log_table(logs)));
    content.push(Widget::Pager(pager));

    PageResponse {
        title: title.clone(),
        crumbs: vec![
            Crumb {
                label: "Leases".to_string(),
                href: "/lease".to_string(),
            },
            Crumb {
                label: title,
                href: lease.uri(),
            },
        ],
        content,
    }
}

fn lease_properties(lease: &Lease, resource: Option<&Resource>) -> PropertyListView {
    let resource_value = match resource {
        Some(resource) => PropertyValue::Text(resource.name.clone()),
        None => PropertyValue::Placeholder("No Resource".to_string()),
    };

    let until_value = match &lease.until {
        Some(at) => PropertyValue::Timestamp(format_timestamp(at)),
        None => PropertyValue::Never,
    };

    PropertyListView::new()
        .property(
            "Status",
            PropertyValue::Text(lease.status.display_label().to_string()),
        )
        .property(
            "Resource Type",
            PropertyValue::Text(lease.resource_type.clone()),
        )
        .property("Resource", resource_value)
        .property("Expires", until_value)
}

fn attribute_properties(lease: &Lease) -> Option<PropertyListView> {
    if lease.attributes.is_empty() {
        return None;
    }

    let mut view = PropertyListView::with_header("Attributes");
    for attribute in &lease.attributes {
        view = view.property(
            attribute.key.clone(),
            PropertyValue::Text(attribute.value.clone()),
        );
    }
    Some(view)
}

/// The release action is always listed; it is disabled, not hidden, when
/// the lease is not releasable or the viewer cannot edit it.
fn release_actions(viewer: &Viewer, lease: &Lease) -> ActionListView {
    let can_edit = has_capability(viewer, lease, Capability::Edit);

    ActionListView {
        actions: vec![Action {
            name: "Release Lease".to_string(),
            href: format!("{}/release", lease.uri()),
            disabled: !lease.can_release() || !can_edit,
        }],
    }
}

fn log_table(logs: &[LeaseLog]) -> LogTableView {
    LogTableView {
        rows: logs
            .iter()
            .map(|log| LogRow {
                event: log.event.clone(),
                detail: log.detail.clone(),
                created_at: format_timestamp(&log.created_at),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_contracts::{LeaseAttribute, LeaseStatus, PolicyScope};
    use chrono::DateTime;

    fn lease_with(status: LeaseStatus) -> Lease {
        Lease {
            id: 3,
            status,
            resource_type: "working-copy".to_string(),
            resource_id: None,
            until: None,
            attributes: Vec::new(),
            owner_id: 10,
            view_scope: PolicyScope::Anyone,
            edit_scope: PolicyScope::OwnerOnly,
        }
    }

    fn viewer(id: i64) -> Viewer {
        Viewer {
            id,
            username: format!("user{}", id),
            is_admin: false,
        }
    }

    fn property_value<'a>(view: &'a PropertyListView, label: &str) -> &'a PropertyValue {
        &view
            .properties
            .iter()
            .find(|p| p.label == label)
            .expect("property should exist")
            .value
    }

    #[test]
    fn status_property_uses_the_total_label_mapping() {
        let cases = [
            (LeaseStatus::Active, "Active"),
            (LeaseStatus::Released, "Released"),
            (LeaseStatus::Expired, "Expired"),
            (LeaseStatus::Pending, "Pending"),
            (LeaseStatus::Broken, "Broken"),
            (LeaseStatus::Unknown, "Unknown"),
        ];
        for (status, label) in cases {
            let view = lease_properties(&lease_with(status), None);
            assert_eq!(
                property_value(&view, "Status"),
                &PropertyValue::Text(label.to_string())
            );
        }
    }

    #[test]
    fn missing_resource_renders_a_placeholder() {
        let view = lease_properties(&lease_with(LeaseStatus::Active), None);
        assert_eq!(
            property_value(&view, "Resource"),
            &PropertyValue::Placeholder("No Resource".to_string())
        );

        let resource = Resource {
            id: 9,
            name: "build-host-7".to_string(),
            resource_type: "host".to_string(),
        };
        let view = lease_properties(&lease_with(LeaseStatus::Active), Some(&resource));
        assert_eq!(
            property_value(&view, "Resource"),
            &PropertyValue::Text("build-host-7".to_string())
        );
    }

    #[test]
    fn unset_expiry_renders_the_never_marker() {
        let mut lease = lease_with(LeaseStatus::Active);
        let view = lease_properties(&lease, None);
        assert_eq!(property_value(&view, "Expires"), &PropertyValue::Never);

        lease.until = DateTime::from_timestamp(0, 0);
        let view = lease_properties(&lease, None);
        assert_eq!(
            property_value(&view, "Expires"),
            &PropertyValue::Timestamp("1970-01-01 00:00:00 UTC".to_string())
        );
    }

    #[test]
    fn attributes_render_in_insertion_order() {
        let mut lease = lease_with(LeaseStatus::Active);
        assert!(attribute_properties(&lease).is_none());

        lease.attributes = vec![
            LeaseAttribute {
                key: "b".to_string(),
                value: "2".to_string(),
            },
            LeaseAttribute {
                key: "a".to_string(),
                value: "1".to_string(),
            },
        ];
        let view = attribute_properties(&lease).expect("attributes section should exist");
        assert_eq!(view.header.as_deref(), Some("Attributes"));
        let labels: Vec<&str> = view.properties.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a"]);
    }

    #[test]
    fn release_action_disabled_state_covers_all_four_combinations() {
        let owner = viewer(10);
        let stranger = viewer(2);

        // releasable && editable
        let lease = lease_with(LeaseStatus::Active);
        assert!(!release_actions(&owner, &lease).actions[0].disabled);

        // releasable && !editable
        assert!(release_actions(&stranger, &lease).actions[0].disabled);

        // !releasable && editable
        let released = lease_with(LeaseStatus::Released);
        assert!(release_actions(&owner, &released).actions[0].disabled);

        // !releasable && !editable
        assert!(release_actions(&stranger, &released).actions[0].disabled);
    }

    #[test]
    fn release_action_is_present_even_when_disabled() {
        let lease = lease_with(LeaseStatus::Expired);
        let view = release_actions(&viewer(2), &lease);
        assert_eq!(view.actions.len(), 1);
        assert_eq!(view.actions[0].name, "Release Lease");
        assert_eq!(view.actions[0].href, "/lease/3/release");
    }

    #[test]
    fn lease_page_orders_widgets() {
        let mut lease = lease_with(LeaseStatus::Active);
        lease.attributes = vec![LeaseAttribute {
            key: "cpu".to_string(),
            value: "8".to_string(),
        }];
        let pager = PagerView {
            offset: 0,
            page_size: 25,
            prev_uri: None,
            next_uri: None,
        };
        let page = build_lease_page(&viewer(10), &lease, None, &[], pager);

        assert_eq!(page.title, "Lease 3");
        assert_eq!(page.crumbs.len(), 2);
        assert!(matches!(page.content[0], Widget::PropertyList(_)));
        assert!(matches!(page.content[1], Widget::PropertyList(_)));
        assert!(matches!(page.content[2], Widget::ActionList(_)));
        assert!(matches!(page.content[3], Widget::LogTable(_)));
        assert!(matches!(page.content[4], Widget::Pager(_)));
    }
}
