use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dom_events::{
    BindOptions, BindRequest, Error, Handler, Invocation, Page, Result, Selection, Target, Value,
};

fn counting_handler() -> (Rc<Cell<u32>>, Handler) {
    let count = Rc::new(Cell::new(0));
    let inner = Rc::clone(&count);
    let handler = Handler::new(move |_, _| {
        inner.set(inner.get() + 1);
        Ok(())
    });
    (count, handler)
}

#[test]
fn binding_the_same_combination_twice_keeps_one_record() -> Result<()> {
    let mut page = Page::from_html("<button id='btn'>go</button>")?;
    let (count, handler) = counting_handler();

    let first = page.on("#btn", "click", &handler)?;
    let second = page.on("#btn", "click", &handler.clone())?;
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(page.bound("#btn", None, None, None)?.len(), 1);

    assert_eq!(page.trigger("#btn", "click")?, 1);
    assert_eq!(count.get(), 1);
    page.click("#btn")?;
    assert_eq!(count.get(), 2);
    Ok(())
}

#[test]
fn distinct_handlers_with_identical_bodies_are_not_deduplicated() -> Result<()> {
    let mut page = Page::from_html("<button id='btn'>go</button>")?;
    let a = Handler::new(|_, _| Ok(()));
    let b = Handler::new(|_, _| Ok(()));
    page.on("#btn", "click", &a)?;
    page.on("#btn", "click", &b)?;
    assert_eq!(page.bound("#btn", Some("click"), None, None)?.len(), 2);
    assert_eq!(page.bound("#btn", Some("click"), Some(&b), None)?.len(), 1);
    Ok(())
}

#[test]
fn once_bindings_fire_a_single_time() -> Result<()> {
    let mut page = Page::from_html("<button id='btn'>go</button>")?;
    let (count, handler) = counting_handler();
    page.on_with("#btn", "click", &handler, BindOptions::new().once(true))?;

    page.click("#btn")?;
    page.click("#btn")?;
    assert_eq!(page.trigger("#btn", "click")?, 0);
    assert_eq!(count.get(), 1);
    assert!(page.bound("#btn", None, None, None)?.is_empty());
    Ok(())
}

#[test]
fn once_binding_survives_a_failing_callback() -> Result<()> {
    let mut page = Page::from_html("<button id='btn'>go</button>")?;
    let attempts = Rc::new(Cell::new(0));
    let inner = Rc::clone(&attempts);
    let handler = Handler::new(move |_, _| {
        inner.set(inner.get() + 1);
        if inner.get() == 1 {
            return Err(Error::Handler("first attempt fails".into()));
        }
        Ok(())
    });
    page.on_with("#btn", "click", &handler, BindOptions::new().once(true))?;

    match page.trigger("#btn", "click") {
        Err(Error::Handler(message)) => assert_eq!(message, "first attempt fails"),
        other => panic!("expected handler error, got: {other:?}"),
    }
    assert_eq!(page.bound("#btn", None, None, None)?.len(), 1);

    assert_eq!(page.trigger("#btn", "click")?, 1);
    assert!(page.bound("#btn", None, None, None)?.is_empty());
    assert_eq!(attempts.get(), 2);
    Ok(())
}

#[test]
fn namespaced_off_leaves_other_namespaces_bound() -> Result<()> {
    let mut page = Page::from_html("<div id='panel'></div>")?;
    let (count, handler) = counting_handler();
    page.on("#panel", "click.ns1", &handler)?;
    page.on("#panel", "click.ns2", &handler)?;

    assert_eq!(page.off("#panel", "click.ns1")?, 1);
    let left = page.bound("#panel", None, None, None)?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].namespace(), Some("ns2"));

    page.click("#panel")?;
    assert_eq!(count.get(), 1);
    Ok(())
}

#[test]
fn nested_namespaces_are_addressed_by_their_first_segment() -> Result<()> {
    let mut page = Page::from_html("<div id='panel'></div>")?;
    let (_, handler) = counting_handler();
    page.on("#panel", "click.menu.open", &handler)?;
    page.on("#panel", "blur.menubar", &handler)?;

    assert_eq!(page.bound("#panel", Some("click.menu"), None, None)?.len(), 1);
    assert_eq!(page.off("#panel", ".menu")?, 1);
    let left = page.bound("#panel", None, None, None)?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].namespace(), Some("menubar"));
    Ok(())
}

#[test]
fn bare_namespace_queries_span_event_types() -> Result<()> {
    let mut page = Page::from_html("<input id='field'>")?;
    let (_, handler) = counting_handler();
    page.on("#field", "focus.form blur.form input", &handler)?;

    assert_eq!(page.bound("#field", Some(".form"), None, None)?.len(), 2);
    assert_eq!(page.trigger("#field", ".form")?, 2);
    assert_eq!(page.off("#field", ".form")?, 2);
    let left = page.bound("#field", None, None, None)?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].event_type(), "input");
    Ok(())
}

#[test]
fn multi_event_keys_create_independent_records() -> Result<()> {
    let mut page = Page::from_html("<input id='field'>")?;
    let seen = Rc::new(RefCell::new(Vec::new()));
    let inner = Rc::clone(&seen);
    let handler = Handler::new(move |_, call: &Invocation| {
        inner
            .borrow_mut()
            .push(call.event().event_type().to_string());
        Ok(())
    });
    let ids = page.on("#field", "click blur", &handler)?;
    assert_eq!(ids.len(), 2);

    page.trigger("#field", "click")?;
    assert_eq!(*seen.borrow(), vec!["click"]);
    page.trigger("#field", "blur")?;
    assert_eq!(*seen.borrow(), vec!["click", "blur"]);

    page.off("#field", "click")?;
    let left = page.bound("#field", None, None, None)?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].event_type(), "blur");
    Ok(())
}

#[test]
fn global_off_empties_the_registry() -> Result<()> {
    let mut page = Page::from_html(
        "<button id='a'>a</button><button id='b'>b</button><input id='c'>",
    )?;
    let (count, handler) = counting_handler();
    let other = Handler::new(|_, _| Ok(()));
    page.on("#a", "click click.x", &handler)?;
    page.on("#b", "mouseenter", &other)?;
    page.on("#c", "focus blur input", &handler)?;
    assert_eq!(page.all_bindings().len(), 6);

    assert_eq!(page.off_all()?, 6);
    assert!(page.all_bindings().is_empty());
    assert!(page.bound_anywhere(None, None, None)?.is_empty());
    page.click("#a")?;
    assert_eq!(count.get(), 0);
    Ok(())
}

#[test]
fn off_handler_removes_only_that_handler() -> Result<()> {
    let mut page = Page::from_html("<button id='btn'>go</button>")?;
    let (kept_count, kept) = counting_handler();
    let (dropped_count, dropped) = counting_handler();
    page.on("#btn", "click", &kept)?;
    page.on("#btn", "click", &dropped)?;

    assert_eq!(page.off_handler("#btn", "click", &dropped)?, 1);
    page.click("#btn")?;
    assert_eq!((kept_count.get(), dropped_count.get()), (1, 0));
    Ok(())
}

#[test]
fn callbacks_receive_event_element_and_extra_args() -> Result<()> {
    let mut page = Page::from_html("<a id='link' href='#'>x</a>")?;
    let captured = Rc::new(RefCell::new(Vec::new()));
    let inner = Rc::clone(&captured);
    let handler = Handler::new(move |_, call: &Invocation| {
        inner.borrow_mut().push(call.args().to_vec());
        Ok(())
    });
    page.on_with(
        "#link",
        "click",
        &handler,
        BindOptions::new().args([Value::from("extra"), Value::from(2)]),
    )?;
    page.click("#link")?;

    let link = page.select("#link")?;
    let calls = captured.borrow();
    assert_eq!(calls.len(), 1);
    let args = &calls[0];
    assert!(matches!(&args[0], Value::Event(event) if event.event_type() == "click"));
    assert_eq!(args[1], Value::Target(Target::Node(link)));
    assert_eq!(args[2..], [Value::from("extra"), Value::Number(2.0)]);
    Ok(())
}

#[test]
fn scope_option_overrides_the_invocation_context() -> Result<()> {
    let mut page = Page::from_html("<button id='btn'>go</button>")?;
    let scopes = Rc::new(RefCell::new(Vec::new()));
    let inner = Rc::clone(&scopes);
    let handler = Handler::new(move |_, call: &Invocation| {
        inner.borrow_mut().push((call.scope().clone(), call.node()));
        Ok(())
    });
    page.on_with(
        "#btn",
        "click",
        &handler,
        BindOptions::new().scope(Target::virtual_target("app")),
    )?;
    page.click("#btn")?;

    let btn = page.select("#btn")?;
    assert_eq!(
        *scopes.borrow(),
        vec![(Target::virtual_target("app"), Some(btn))]
    );
    Ok(())
}

#[test]
fn init_pseudo_event_runs_immediately_without_a_record() -> Result<()> {
    let mut page = Page::from_html("<ul><li class='row'>a</li><li class='row'>b</li></ul>")?;
    let seen = Rc::new(RefCell::new(Vec::new()));
    let inner = Rc::clone(&seen);
    let handler = Handler::new(move |page: &mut Page, call: &Invocation| {
        let node = call.node().ok_or_else(|| Error::Handler("no node".into()))?;
        inner.borrow_mut().push(page.text(node)?);
        Ok(())
    });

    let created = page.on(".row", "init", &handler)?;
    assert!(created.is_empty());
    assert_eq!(*seen.borrow(), vec!["a", "b"]);
    assert!(page.all_bindings().is_empty());
    Ok(())
}

#[test]
fn init_option_runs_now_and_keeps_the_binding() -> Result<()> {
    let mut page = Page::from_html("<input id='field'>")?;
    let (count, handler) = counting_handler();
    page.on_with("#field", "input", &handler, BindOptions::new().init(true))?;
    assert_eq!(count.get(), 1);
    page.dispatch("#field", "input")?;
    assert_eq!(count.get(), 2);
    Ok(())
}

#[test]
fn unsupported_types_are_silently_skipped() -> Result<()> {
    let mut page = Page::from_html("<div id='box'></div>")?;
    let (_, handler) = counting_handler();
    assert_eq!(page.on("#box", "click swipe", &handler)?.len(), 1);
    assert!(page.bound("#box", Some("swipe"), None, None)?.is_empty());
    Ok(())
}

#[test]
fn missing_targets_bind_nothing_but_bad_selectors_fail() -> Result<()> {
    let mut page = Page::from_html("<div id='box'></div>")?;
    let (_, handler) = counting_handler();
    assert!(page.on("#missing", "click", &handler)?.is_empty());
    assert_eq!(page.off("#missing", "click")?, 0);
    assert!(page.on("div[", "click", &handler).is_err());
    Ok(())
}

#[test]
fn map_and_bulk_requests_bind_every_entry() -> Result<()> {
    let mut page = Page::from_html("<form id='f'><input id='name'><button id='go'>go</button></form>")?;
    let (count, handler) = counting_handler();

    page.on_map(
        "#name",
        vec![
            ("focus".into(), handler.clone()),
            ("blur change".into(), handler.clone()),
        ],
        BindOptions::new().namespace("form"),
    )?;
    page.bind(
        BindRequest::Bulk(vec![
            (Selection::from("#go"), vec![("click".into(), handler.clone())]),
            (Selection::from("#f"), vec![("submit".into(), handler.clone())]),
        ]),
        BindOptions::default(),
    )?;

    assert_eq!(page.bound("#name", Some(".form"), None, None)?.len(), 3);
    assert_eq!(page.all_bindings().len(), 5);
    page.click("#go")?;
    page.dispatch("#f", "submit")?;
    assert_eq!(count.get(), 2);
    Ok(())
}

#[test]
fn native_dispatch_honors_stop_propagation() -> Result<()> {
    let mut page = Page::from_html("<div id='outer'><button id='inner'>x</button></div>")?;
    let (outer_count, outer) = counting_handler();
    let stopper = Handler::new(|_, call: &Invocation| {
        call.event().stop_propagation();
        call.event().prevent_default();
        Ok(())
    });
    page.on("#outer", "click", &outer)?;
    page.on("#inner", "click", &stopper)?;

    let outcome = page.click("#inner")?;
    assert!(outcome.default_prevented);
    assert!(outcome.propagation_stopped);
    assert_eq!(outer_count.get(), 0);

    page.off("#inner", "click")?;
    let outcome = page.click("#inner")?;
    assert!(!outcome.default_prevented);
    assert_eq!(outer_count.get(), 1);
    Ok(())
}

#[test]
fn listener_removed_mid_dispatch_is_skipped() -> Result<()> {
    let mut page = Page::from_html("<button id='btn'>go</button>")?;
    let (second_count, second) = counting_handler();
    let second_for_first = second.clone();
    let first = Handler::new(move |page: &mut Page, _| {
        page.off_handler("#btn", "click", &second_for_first)?;
        Ok(())
    });
    page.on("#btn", "click", &first)?;
    page.on("#btn", "click", &second)?;

    page.click("#btn")?;
    assert_eq!(second_count.get(), 0);
    Ok(())
}

#[test]
fn pages_do_not_share_bindings() -> Result<()> {
    let html = "<button id='btn'>go</button>";
    let mut first = Page::from_html(html)?;
    let second = Page::from_html(html)?;
    let (_, handler) = counting_handler();
    first.on("#btn", "click", &handler)?;
    assert_eq!(first.all_bindings().len(), 1);
    assert!(second.all_bindings().is_empty());
    Ok(())
}
