use std::{cell::Cell, rc::Rc};

use element_watch::{watch_with, MemoryDocument, NodeId, WatchConfig, WatchError};
use pretty_assertions::assert_eq;

/// A callback that counts its invocations.
fn counter() -> (Rc<Cell<usize>>, impl FnMut() + 'static) {
    let count = Rc::new(Cell::new(0));
    let inner = count.clone();
    (count, move || inner.set(inner.get() + 1))
}

fn app(document: &MemoryDocument) -> NodeId {
    document.create_element_with_attributes("div", &[("id", "app")])
}

fn add_to_body(document: &MemoryDocument, tag: &str) -> NodeId {
    let node = document.create_element(tag);
    document.append_child(document.body(), node);
    node
}

#[test]
fn immediate_match_fires_before_returning() {
    for observe_after in [true, false] {
        let document = MemoryDocument::new();
        let target = app(&document);
        document.append_child(document.body(), target);
        document.flush();

        let (count, callback) = counter();
        watch_with(
            document.clone(),
            "#app",
            callback,
            WatchConfig::new().observe_after(observe_after),
        )
        .unwrap();

        assert_eq!(count.get(), 1);
    }
}

#[test]
fn deferred_match_fires_once_the_element_is_added() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();
    watch_with(document.clone(), "#app", callback, WatchConfig::new()).unwrap();
    assert_eq!(count.get(), 0);

    add_to_body(&document, "span");
    document.flush();
    assert_eq!(count.get(), 0);

    document.append_child(document.body(), app(&document));
    assert_eq!(count.get(), 0, "delivery is deferred until the flush");
    document.flush();
    assert_eq!(count.get(), 1);
}

#[test]
fn element_inside_an_added_subtree_is_found() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();
    watch_with(document.clone(), "section .mount", callback, WatchConfig::new()).unwrap();

    let section = document.create_element("section");
    let mount = document.create_element_with_attributes("div", &[("class", "mount")]);
    document.append_child(section, mount);
    document.append_child(document.body(), section);
    document.flush();

    assert_eq!(count.get(), 1);
}

#[test]
fn batches_without_additions_never_fire() {
    let document = MemoryDocument::new();
    let placeholder = add_to_body(&document, "div");
    let doomed = add_to_body(&document, "p");
    document.flush();

    let (count, callback) = counter();
    watch_with(document.clone(), "#app", callback, WatchConfig::new()).unwrap();

    // the selector starts matching through an attribute change, which adds no nodes
    document.set_attribute(placeholder, "id", "app");
    document.remove(doomed);
    document.flush();
    assert_eq!(count.get(), 0);

    // the next batch that adds anything re-queries and finds it
    add_to_body(&document, "span");
    document.flush();
    assert_eq!(count.get(), 1);
}

#[test]
fn additions_that_do_not_match_never_fire() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();
    watch_with(document.clone(), "div#app", callback, WatchConfig::new()).unwrap();

    for _ in 0..5 {
        add_to_body(&document, "div");
        document.flush();
    }
    let wrong_tag = document.create_element_with_attributes("span", &[("id", "app")]);
    document.append_child(document.body(), wrong_tag);
    document.flush();

    assert_eq!(count.get(), 0);
}

#[test]
fn element_added_and_removed_within_one_batch_is_missed() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();
    watch_with(document.clone(), "#app", callback, WatchConfig::new()).unwrap();

    let target = app(&document);
    document.append_child(document.body(), target);
    document.remove(target);
    document.flush();

    assert_eq!(count.get(), 0);
}

#[test]
fn one_shot_ignores_later_appearances() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();
    watch_with(
        document.clone(),
        "#app",
        callback,
        WatchConfig::new().observe_after(false),
    )
    .unwrap();

    let target = app(&document);
    document.append_child(document.body(), target);
    document.flush();
    assert_eq!(count.get(), 1);
    assert_eq!(document.active_observers(), 0);

    for _ in 0..3 {
        document.remove(target);
        document.flush();
        document.append_child(document.body(), target);
        document.flush();
    }

    assert_eq!(count.get(), 1);
    assert_eq!(document.active_observers(), 0);
}

#[test]
fn observing_after_fires_once_per_appearance() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();
    watch_with(document.clone(), "#app", callback, WatchConfig::new()).unwrap();
    assert_eq!(document.active_observers(), 1);

    let target = app(&document);
    document.append_child(document.body(), target);
    document.flush();
    assert_eq!(count.get(), 1);
    assert_eq!(document.active_observers(), 1);

    document.remove(target);
    document.flush();
    assert_eq!(count.get(), 1);
    assert_eq!(document.active_observers(), 1);

    document.append_child(document.body(), target);
    document.flush();
    assert_eq!(count.get(), 2);
    assert_eq!(document.active_observers(), 1);
}

#[test]
fn cycle_repeats_indefinitely() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();
    watch_with(document.clone(), ".widget", callback, WatchConfig::new()).unwrap();

    for round in 1..=10 {
        let widget = document.create_element_with_attributes("div", &[("class", "widget")]);
        document.append_child(document.body(), widget);
        document.flush();
        assert_eq!(count.get(), round);

        document.remove(widget);
        document.flush();
    }
}

#[test]
fn unrelated_churn_yields_a_single_invocation() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();
    watch_with(
        document.clone(),
        "#app",
        callback,
        WatchConfig::new().observe_after(false),
    )
    .unwrap();

    for _ in 0..3 {
        let noise = add_to_body(&document, "li");
        document.flush();
        document.remove(noise);
        document.flush();
    }

    let noise = add_to_body(&document, "li");
    document.append_child(document.body(), app(&document));
    document.remove(noise);
    document.flush();
    assert_eq!(count.get(), 1);

    for _ in 0..3 {
        let noise = add_to_body(&document, "li");
        document.flush();
        document.remove(noise);
        document.flush();
    }
    assert_eq!(count.get(), 1);
}

#[test]
fn removing_other_nodes_keeps_waiting_for_the_target_to_leave() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();
    watch_with(document.clone(), "#app", callback, WatchConfig::new()).unwrap();

    let target = app(&document);
    document.append_child(document.body(), target);
    document.flush();
    assert_eq!(count.get(), 1);

    // the disappearance observer ignores these, and nothing re-arms the appearance observer
    for _ in 0..3 {
        let noise = add_to_body(&document, "span");
        document.flush();
        document.remove(noise);
        document.flush();
    }
    assert_eq!(count.get(), 1);

    document.remove(target);
    document.flush();
    document.append_child(document.body(), target);
    document.flush();
    assert_eq!(count.get(), 2);
}

#[test]
fn a_remaining_match_counts_as_still_present() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();
    watch_with(document.clone(), ".slot", callback, WatchConfig::new()).unwrap();

    let first = document.create_element_with_attributes("div", &[("class", "slot")]);
    let second = document.create_element_with_attributes("div", &[("class", "slot")]);
    document.append_child(document.body(), first);
    document.append_child(document.body(), second);
    document.flush();
    assert_eq!(count.get(), 1);

    document.remove(first);
    document.flush();
    document.append_child(document.body(), first);
    document.flush();
    assert_eq!(count.get(), 1);

    document.remove(first);
    document.remove(second);
    document.flush();
    document.append_child(document.body(), second);
    document.flush();
    assert_eq!(count.get(), 2);
}

#[test]
fn immediate_match_still_arms_the_appearance_observer() {
    let document = MemoryDocument::new();
    document.append_child(document.body(), app(&document));
    document.flush();

    let (count, callback) = counter();
    watch_with(document.clone(), "#app", callback, WatchConfig::new()).unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(document.active_observers(), 1);

    // the element never left, but any addition re-queries and finds it
    add_to_body(&document, "span");
    document.flush();
    assert_eq!(count.get(), 2);
}

#[test]
fn settled_immediate_match_waits_for_removal() {
    let document = MemoryDocument::new();
    let target = app(&document);
    document.append_child(document.body(), target);
    document.flush();

    let (count, callback) = counter();
    watch_with(
        document.clone(),
        "#app",
        callback,
        WatchConfig::new().settle_on_immediate_match(true),
    )
    .unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(document.active_observers(), 1);

    add_to_body(&document, "span");
    document.flush();
    assert_eq!(count.get(), 1);

    document.remove(target);
    document.flush();
    document.append_child(document.body(), target);
    document.flush();
    assert_eq!(count.get(), 2);
}

#[test]
fn settled_immediate_match_without_observe_after_stops() {
    let document = MemoryDocument::new();
    let target = app(&document);
    document.append_child(document.body(), target);
    document.flush();

    let (count, callback) = counter();
    watch_with(
        document.clone(),
        "#app",
        callback,
        WatchConfig::new()
            .observe_after(false)
            .settle_on_immediate_match(true),
    )
    .unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(document.active_observers(), 0);

    document.remove(target);
    document.flush();
    document.append_child(document.body(), target);
    document.flush();
    assert_eq!(count.get(), 1);
}

#[test]
fn invalid_selector_is_returned_to_the_caller() {
    let document = MemoryDocument::new();
    let (count, callback) = counter();

    let err = watch_with(document.clone(), "div >", callback, WatchConfig::new()).unwrap_err();

    assert!(matches!(err, WatchError::InvalidSelector { ref selector, .. } if selector == "div >"));
    assert_eq!(count.get(), 0);
    assert_eq!(document.active_observers(), 0);
}

#[test]
fn missing_root_is_returned_to_the_caller() {
    let document = MemoryDocument::new();
    let (_, callback) = counter();

    let err = watch_with(
        document.clone(),
        "#app",
        callback,
        WatchConfig::new().root("#legacy-root"),
    )
    .unwrap_err();

    assert_eq!(
        err,
        WatchError::MissingRoot {
            selector: "#legacy-root".to_string()
        }
    );
}

#[test]
fn immediate_match_runs_even_when_the_root_is_missing() {
    let document = MemoryDocument::new();
    document.append_child(document.body(), app(&document));
    document.flush();

    let (count, callback) = counter();
    let result = watch_with(
        document.clone(),
        "#app",
        callback,
        WatchConfig::new().root("#legacy-root"),
    );

    assert_eq!(count.get(), 1);
    assert_eq!(
        result,
        Err(WatchError::MissingRoot {
            selector: "#legacy-root".to_string()
        })
    );
    assert_eq!(document.active_observers(), 0);
}

#[test]
fn custom_root_limits_what_is_observed() {
    let document = MemoryDocument::new();
    let root = document.create_element_with_attributes("main", &[("id", "legacy-root")]);
    let sidebar = add_to_body(&document, "aside");
    document.append_child(document.body(), root);
    document.flush();

    let (count, callback) = counter();
    watch_with(
        document.clone(),
        "#app",
        callback,
        WatchConfig::new().root("#legacy-root"),
    )
    .unwrap();

    // the query is document wide, but only additions under the root are delivered
    document.append_child(sidebar, app(&document));
    document.flush();
    assert_eq!(count.get(), 0);

    document.append_child(root, document.create_element("p"));
    document.flush();
    assert_eq!(count.get(), 1);
}

#[test]
fn watchers_are_independent() {
    let document = MemoryDocument::new();
    let (apps, app_callback) = counter();
    let (widgets, widget_callback) = counter();
    watch_with(document.clone(), "#app", app_callback, WatchConfig::new()).unwrap();
    watch_with(
        document.clone(),
        ".widget",
        widget_callback,
        WatchConfig::new().observe_after(false),
    )
    .unwrap();

    document.append_child(document.body(), app(&document));
    document.flush();
    assert_eq!((apps.get(), widgets.get()), (1, 0));

    let widget = document.create_element_with_attributes("div", &[("class", "widget")]);
    document.append_child(document.body(), widget);
    document.flush();
    assert_eq!((apps.get(), widgets.get()), (1, 1));
}

#[test]
fn callback_may_mutate_the_document() {
    let document = MemoryDocument::new();
    let doc = document.clone();
    let rendered = Rc::new(Cell::new(0));
    let renders = rendered.clone();

    watch_with(
        document.clone(),
        "#app",
        move || {
            renders.set(renders.get() + 1);
            if let Ok(Some(target)) = doc.query_selector("#app") {
                doc.append_child(target, doc.create_element("h1"));
            }
        },
        WatchConfig::new(),
    )
    .unwrap();

    document.append_child(document.body(), app(&document));
    document.flush();

    assert_eq!(rendered.get(), 1);
    assert!(document.query_selector("#app > h1").unwrap().is_some());
}

#[test]
fn callback_may_flush_from_inside_a_delivery() {
    let document = MemoryDocument::new();
    let doc = document.clone();
    let (count, mut tick) = counter();

    watch_with(
        document.clone(),
        "#app",
        move || {
            tick();
            if let Ok(Some(target)) = doc.query_selector("#app") {
                doc.append_child(target, doc.create_element("h1"));
            }
            doc.flush();
        },
        WatchConfig::new(),
    )
    .unwrap();

    let target = app(&document);
    document.append_child(document.body(), target);
    document.flush();
    assert_eq!(count.get(), 1);
    assert_eq!(document.pending_records(), 0);

    document.remove(target);
    document.flush();
    document.append_child(document.body(), target);
    document.flush();
    assert_eq!(count.get(), 2);
}
