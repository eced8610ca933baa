use std::cell::RefCell;
use std::rc::Rc;

use dom_events::{BindOptions, Handler, Invocation, NodeId, Page, Result, Selection, Target};

const LIST_HTML: &str = r#"
<div id="list" class="parent">
  <span id="item-1" class="item">one</span>
  <span id="item-2" class="item">two</span>
  <span id="item-3" class="item"><b id="label-3">three</b></span>
  <span id="item-4" class="item">four</span>
  <span id="item-5" class="item">five</span>
</div>
<p id="outside">outside</p>
"#;

fn recording_handler() -> (Rc<RefCell<Vec<(Option<NodeId>, Target)>>>, Handler) {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let inner = Rc::clone(&calls);
    let handler = Handler::new(move |_, call: &Invocation| {
        inner.borrow_mut().push((call.node(), call.scope().clone()));
        Ok(())
    });
    (calls, handler)
}

#[test]
fn delegated_click_resolves_the_matching_child() -> Result<()> {
    let mut page = Page::from_html(LIST_HTML)?;
    let (calls, handler) = recording_handler();
    page.on_with(".item", "click", &handler, BindOptions::new().delegate(".parent"))?;

    let bindings = page.all_bindings();
    assert_eq!(bindings.len(), 1);
    let list = page.select("#list")?;
    assert_eq!(bindings[0].element(), &Target::Node(list));
    assert_eq!(bindings[0].delegate(), Some(&Selection::from(".item")));

    page.click("#item-3")?;
    let third = page.select("#item-3")?;
    assert_eq!(*calls.borrow(), vec![(Some(third), Target::Node(third))]);
    Ok(())
}

#[test]
fn events_from_nested_nodes_resolve_to_the_enclosing_match() -> Result<()> {
    let mut page = Page::from_html(LIST_HTML)?;
    let (calls, handler) = recording_handler();
    page.on_with(".item", "click", &handler, BindOptions::new().delegate("#list"))?;

    page.click("#label-3")?;
    let third = page.select("#item-3")?;
    assert_eq!(calls.borrow().len(), 1);
    assert_eq!(calls.borrow()[0].0, Some(third));
    Ok(())
}

#[test]
fn events_outside_every_match_skip_the_callback_but_keep_the_binding() -> Result<()> {
    let mut page = Page::from_html(LIST_HTML)?;
    let (calls, handler) = recording_handler();
    page.on_with(".item", "click", &handler, BindOptions::new().delegate("#list"))?;

    page.click("#list")?;
    page.click("#outside")?;
    assert!(calls.borrow().is_empty());
    assert_eq!(page.all_bindings().len(), 1);

    page.click("#item-5")?;
    assert_eq!(calls.borrow().len(), 1);
    Ok(())
}

#[test]
fn delegation_sees_children_added_and_changed_after_binding() -> Result<()> {
    let mut page = Page::from_html(LIST_HTML)?;
    let (calls, handler) = recording_handler();
    page.on_with(".item", "click", &handler, BindOptions::new().delegate("#list"))?;

    let list = page.select("#list")?;
    let added = page.append_html(list, "<span id='item-6' class='item'>six</span>")?;
    page.click("#item-6")?;
    assert_eq!(calls.borrow().last().map(|c| c.0), Some(Some(added[0])));

    let second = page.select("#item-2")?;
    page.remove_class(second, "item")?;
    page.click("#item-2")?;
    assert_eq!(calls.borrow().len(), 1);

    page.add_class(second, "item")?;
    assert_eq!(page.select_all(".item")?.len(), 6);
    page.click("#item-2")?;
    assert_eq!(calls.borrow().last().map(|c| c.0), Some(Some(second)));
    Ok(())
}

#[test]
fn reference_markers_are_resolved_on_every_dispatch() -> Result<()> {
    let mut page = Page::from_html(
        r#"<nav id="menu"><a id="home" data-ref="entry">home</a><a id="about">about</a></nav>"#,
    )?;
    let (calls, handler) = recording_handler();
    page.on_with("ref:entry", "click", &handler, BindOptions::new().delegate("#menu"))?;

    page.click("#about")?;
    assert!(calls.borrow().is_empty());

    let about = page.select("#about")?;
    page.set_attr(about, "data-ref", "entry secondary")?;
    page.click("#about")?;
    assert_eq!(calls.borrow().len(), 1);
    assert_eq!(calls.borrow()[0].0, Some(about));
    Ok(())
}

#[test]
fn delegated_and_direct_bindings_do_not_deduplicate_each_other() -> Result<()> {
    let mut page = Page::from_html(LIST_HTML)?;
    let (_, handler) = recording_handler();
    page.on("#list", "click", &handler)?;
    page.on_with(".item", "click", &handler, BindOptions::new().delegate("#list"))?;
    page.on_with(".item", "click", &handler, BindOptions::new().delegate("#list"))?;
    page.on_with("#item-1", "click", &handler, BindOptions::new().delegate("#list"))?;

    assert_eq!(page.bound("#list", Some("click"), None, None)?.len(), 3);
    let items = Selection::from(".item");
    let delegated = page.bound("#list", Some("click"), None, Some(&items))?;
    assert_eq!(delegated.len(), 1);
    assert_eq!(delegated[0].delegate(), Some(&items));
    Ok(())
}

#[test]
fn delegate_filter_works_without_a_target() -> Result<()> {
    let mut page = Page::from_html(LIST_HTML)?;
    let (_, handler) = recording_handler();
    page.on("#outside", "click", &handler)?;
    page.on_with(".item", "click", &handler, BindOptions::new().delegate("#list"))?;
    page.on_with(".item", "blur", &handler, BindOptions::new().delegate("body, #list"))?;

    let items = Selection::from(".item");
    let delegated = page.bound_anywhere(None, None, Some(&items))?;
    assert_eq!(delegated.len(), 2);
    assert!(delegated.iter().all(|binding| binding.delegate() == Some(&items)));
    assert_eq!(page.bound_anywhere(Some("blur"), None, Some(&items))?.len(), 1);
    assert_eq!(page.bound_anywhere(None, Some(&handler), None)?.len(), 3);
    Ok(())
}

#[test]
fn trigger_on_a_delegate_root_runs_no_delegated_callbacks() -> Result<()> {
    let mut page = Page::from_html(LIST_HTML)?;
    let (calls, handler) = recording_handler();
    page.on_with(".item", "click", &handler, BindOptions::new().delegate("#list"))?;

    assert_eq!(page.trigger("#list", "click")?, 0);
    assert!(calls.borrow().is_empty());
    Ok(())
}

#[test]
fn once_delegated_binding_waits_for_a_real_match() -> Result<()> {
    let mut page = Page::from_html(LIST_HTML)?;
    let (calls, handler) = recording_handler();
    page.on_with(
        ".item",
        "click",
        &handler,
        BindOptions::new().delegate("#list").once(true),
    )?;

    page.click("#list")?;
    assert_eq!(page.all_bindings().len(), 1);
    page.click("#item-1")?;
    page.click("#item-2")?;
    assert_eq!(calls.borrow().len(), 1);
    assert!(page.all_bindings().is_empty());
    Ok(())
}
