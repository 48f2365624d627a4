//! Flat event stream → nested tree, lazily.
//!
//! The algorithm is generic over a [`TreeBuilder`] supplying three pure
//! functions: `is_exit` (does this event close the current level),
//! `try_open` (build a container from an event and its lazy children, or
//! decline) and `to_leaf` (turn a non-container event into a node).
//!
//! [`build_forest`] yields the siblings of the top level one at a time.
//! A sibling is only built when the caller asks for it, and building it pulls
//! events up to and including its matching exit event, never further. The
//! event iterator left after the level is available through
//! [`Forest::into_remainder`].
//!
//! ## Single-pass
//!
//! Alle Ebenen teilen sich denselben Cursor (`&mut I`). Die Kinder einer
//! Ebene sind ein Iterator, der diesen Cursor ausleiht; was `try_open` nicht
//! konsumiert, wird danach bis zum passenden Exit verworfen. Einmal gelesene
//! Events sind weg, es gibt kein Replay.
//!
//! ## Tiefe
//!
//! Der generische Weg ueber [`Children`] rekursiert einmal pro Ebene.
//! [`XmlTreeBuilder`] baut seinen Teilbaum deshalb mit eigenem Stack ueber
//! [`Children::next_event`]; beliebig tiefe Dokumente kosten nur Heap.

use crate::event::Event;
use crate::node::{Element, Node};
use crate::{Error, Result};

/// The three functions that specialize the tree algorithm.
pub trait TreeBuilder: Sized {
    type Event;
    type Node;
    type Error;

    /// True iff `event` closes the current level.
    fn is_exit(&self, event: &Self::Event) -> bool;

    /// Builds a container from `event` and its children, or returns
    /// `Ok(None)` if `event` is not a container.
    ///
    /// `children` is lazy: a builder that declines must not pull from it.
    /// Children left unconsumed after a container is built are skipped.
    fn try_open<I>(
        &self,
        event: &Self::Event,
        children: &mut Children<'_, I, Self>,
    ) -> core::result::Result<Option<Self::Node>, Self::Error>
    where
        I: Iterator<Item = core::result::Result<Self::Event, Self::Error>>;

    /// Converts a non-container event into a leaf node.
    fn to_leaf(&self, event: Self::Event) -> Self::Node;
}

/// Lazy siblings of one nested level, borrowing the shared cursor.
pub struct Children<'a, I, B> {
    events: &'a mut I,
    builder: &'a B,
    done: bool,
}

impl<I, B> Iterator for Children<'_, I, B>
where
    B: TreeBuilder,
    I: Iterator<Item = core::result::Result<B::Event, B::Error>>,
{
    type Item = core::result::Result<B::Node, B::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        next_sibling(self.events, self.builder, &mut self.done)
    }
}

impl<I, B> Children<'_, I, B>
where
    B: TreeBuilder,
    I: Iterator<Item = core::result::Result<B::Event, B::Error>>,
{
    /// Pulls the next raw event of the shared cursor, for builders that
    /// assemble a whole subtree with their own stack.
    ///
    /// Such a builder tracks nesting itself and calls [`close`](Self::close)
    /// once it has consumed the exit event of this level.
    pub fn next_event(&mut self) -> Option<core::result::Result<B::Event, B::Error>> {
        if self.done {
            return None;
        }
        let event = self.events.next();
        if !matches!(event, Some(Ok(_))) {
            self.done = true;
        }
        event
    }

    /// Marks this level as finished; nothing more is pulled or skipped.
    pub fn close(&mut self) {
        self.done = true;
    }
}

/// Lazy siblings of the top level, owning the cursor.
pub struct Forest<I, B> {
    events: I,
    builder: B,
    done: bool,
}

impl<I, B> Forest<I, B> {
    /// The events after this level: everything past the exit event that ended
    /// it, or the unread rest if iteration stopped early.
    pub fn into_remainder(self) -> I {
        self.events
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }
}

impl<I, B> Iterator for Forest<I, B>
where
    B: TreeBuilder,
    I: Iterator<Item = core::result::Result<B::Event, B::Error>>,
{
    type Item = core::result::Result<B::Node, B::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        next_sibling(&mut self.events, &self.builder, &mut self.done)
    }
}

/// Builds the top-level siblings of `events` lazily.
pub fn build_forest<I, B>(events: I, builder: B) -> Forest<I, B>
where
    B: TreeBuilder,
    I: Iterator<Item = core::result::Result<B::Event, B::Error>>,
{
    Forest { events, builder, done: false }
}

fn next_sibling<I, B>(
    events: &mut I,
    builder: &B,
    done: &mut bool,
) -> Option<core::result::Result<B::Node, B::Error>>
where
    B: TreeBuilder,
    I: Iterator<Item = core::result::Result<B::Event, B::Error>>,
{
    let event = match events.next() {
        None => {
            *done = true;
            return None;
        }
        Some(Err(e)) => {
            *done = true;
            return Some(Err(e));
        }
        Some(Ok(event)) => event,
    };

    if builder.is_exit(&event) {
        *done = true;
        return None;
    }

    let mut children = Children { events: &mut *events, builder, done: false };
    match builder.try_open(&event, &mut children) {
        Ok(Some(node)) => {
            // Rest der Ebene bis zum passenden Exit verwerfen
            for child in children.by_ref() {
                if let Err(e) = child {
                    *done = true;
                    return Some(Err(e));
                }
            }
            Some(Ok(node))
        }
        Ok(None) => Some(Ok(builder.to_leaf(event))),
        Err(e) => {
            *done = true;
            Some(Err(e))
        }
    }
}

// ============================================================================
// XML-Spezialisierung
// ============================================================================

/// Builds [`Node`]s from [`Event`]s: end-element closes a level,
/// start-element opens an [`Element`], everything else is a leaf.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlTreeBuilder;

impl TreeBuilder for XmlTreeBuilder {
    type Event = Event;
    type Node = Node;
    type Error = Error;

    fn is_exit(&self, event: &Event) -> bool {
        matches!(event, Event::EndElement { .. })
    }

    fn try_open<I>(&self, event: &Event, children: &mut Children<'_, I, Self>) -> Result<Option<Node>>
    where
        I: Iterator<Item = Result<Event>>,
    {
        let Event::StartElement { name, attrs } = event else {
            return Ok(None);
        };
        // Eigener Stack statt Rekursion ueber Children: Tiefe kostet keinen Call-Stack
        let mut open = vec![(name.clone(), attrs.clone(), Vec::new())];
        loop {
            match children.next_event().transpose()? {
                Some(Event::StartElement { name, attrs }) => open.push((name, attrs, Vec::new())),
                Some(leaf @ (Event::Characters(_) | Event::CData(_) | Event::Comment(_))) => {
                    if let Some((_, _, content)) = open.last_mut() {
                        content.push(self.to_leaf(leaf));
                    }
                }
                // End-Event oder Ende des Stroms schliesst das innerste Element
                Some(Event::EndElement { .. }) | None => {
                    let Some((tag, attrs, content)) = open.pop() else {
                        return Ok(None);
                    };
                    let el = Node::Element(Element::new(tag, attrs, content));
                    match open.last_mut() {
                        Some((_, _, parent)) => parent.push(el),
                        None => {
                            children.close();
                            return Ok(Some(el));
                        }
                    }
                }
            }
        }
    }

    fn to_leaf(&self, event: Event) -> Node {
        match event {
            Event::Characters(s) => Node::Text(s),
            Event::CData(s) => Node::CData(s),
            Event::Comment(s) => Node::Comment(s),
            // Start oeffnet immer, End ist Exit: hier nicht erreichbar
            Event::StartElement { .. } | Event::EndElement { .. } => Node::text(""),
        }
    }
}

/// Lazily builds XML nodes from a fallible event stream.
pub fn nodes_from_events<I>(events: I) -> Forest<I, XmlTreeBuilder>
where
    I: Iterator<Item = Result<Event>>,
{
    build_forest(events, XmlTreeBuilder)
}

/// Builds all top-level nodes of an in-memory event sequence.
pub fn collect_nodes(events: impl IntoIterator<Item = Event>) -> Result<Vec<Node>> {
    nodes_from_events(events.into_iter().map(Ok)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attributes;
    use std::cell::Cell;
    use std::convert::Infallible;

    /// Minimaler Builder: '(' oeffnet, ')' schliesst, alles andere ist Blatt.
    #[derive(Debug, PartialEq)]
    enum Toy {
        Leaf(char),
        Group(Vec<Toy>),
    }

    struct ParenBuilder;

    impl TreeBuilder for ParenBuilder {
        type Event = char;
        type Node = Toy;
        type Error = Infallible;

        fn is_exit(&self, event: &char) -> bool {
            *event == ')'
        }

        fn try_open<I>(
            &self,
            event: &char,
            children: &mut Children<'_, I, Self>,
        ) -> core::result::Result<Option<Toy>, Infallible>
        where
            I: Iterator<Item = core::result::Result<char, Infallible>>,
        {
            if *event != '(' {
                return Ok(None);
            }
            Ok(Some(Toy::Group(children.collect::<core::result::Result<_, _>>()?)))
        }

        fn to_leaf(&self, event: char) -> Toy {
            Toy::Leaf(event)
        }
    }

    fn toy(src: &str) -> Vec<Toy> {
        build_forest(src.chars().map(Ok), ParenBuilder)
            .collect::<core::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn generic_nesting() {
        assert_eq!(
            toy("a(b(c)d)e"),
            vec![
                Toy::Leaf('a'),
                Toy::Group(vec![
                    Toy::Leaf('b'),
                    Toy::Group(vec![Toy::Leaf('c')]),
                    Toy::Leaf('d'),
                ]),
                Toy::Leaf('e'),
            ]
        );
    }

    #[test]
    fn exit_hands_back_remainder() {
        let mut forest = build_forest("ab)cd".chars().map(Ok), ParenBuilder);
        let level: Vec<_> = forest.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(level, vec![Toy::Leaf('a'), Toy::Leaf('b')]);
        let rest: String = forest.into_remainder().map(|r| r.unwrap()).collect();
        assert_eq!(rest, "cd");
    }

    #[test]
    fn first_root_stops_at_matching_exit() {
        let pulled = Cell::new(0usize);
        let events = "(a(b))(c)".chars().inspect(|_| pulled.set(pulled.get() + 1)).map(Ok);
        let mut forest = build_forest(events, ParenBuilder);
        let first = forest.next().unwrap().unwrap();
        assert_eq!(
            first,
            Toy::Group(vec![Toy::Leaf('a'), Toy::Group(vec![Toy::Leaf('b')])])
        );
        assert_eq!(pulled.get(), 6);
    }

    /// Builder der nur das erste Kind nimmt; der Rest muss verworfen werden.
    struct FirstChildOnly;

    impl TreeBuilder for FirstChildOnly {
        type Event = char;
        type Node = Toy;
        type Error = Infallible;

        fn is_exit(&self, event: &char) -> bool {
            *event == ')'
        }

        fn try_open<I>(
            &self,
            event: &char,
            children: &mut Children<'_, I, Self>,
        ) -> core::result::Result<Option<Toy>, Infallible>
        where
            I: Iterator<Item = core::result::Result<char, Infallible>>,
        {
            if *event != '(' {
                return Ok(None);
            }
            let first = children.next().transpose()?;
            Ok(Some(Toy::Group(first.into_iter().collect())))
        }

        fn to_leaf(&self, event: char) -> Toy {
            Toy::Leaf(event)
        }
    }

    #[test]
    fn unconsumed_children_are_skipped() {
        let nodes: Vec<Toy> = build_forest("(ab(cd))e".chars().map(Ok), FirstChildOnly)
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(nodes, vec![Toy::Group(vec![Toy::Leaf('a')]), Toy::Leaf('e')]);
    }

    #[test]
    fn xml_specialization() {
        let events = vec![
            Event::start("a", Attributes::new().with("id", "1")),
            Event::start("b", Attributes::new()),
            Event::characters("x"),
            Event::end("b"),
            Event::Comment("c".into()),
            Event::characters("y"),
            Event::end("a"),
        ];
        let nodes = collect_nodes(events).unwrap();
        assert_eq!(
            nodes,
            vec![Node::element(
                "a",
                Attributes::new().with("id", "1"),
                [
                    Node::element("b", Attributes::new(), [Node::text("x")]),
                    Node::comment("c"),
                    Node::text("y"),
                ],
            )]
        );
    }

    #[test]
    fn tiefe_verschachtelung_ohne_rekursion() {
        let depth = 50_000;
        let events = (0..depth)
            .map(|_| Event::start("e", Attributes::new()))
            .chain((0..depth).map(|_| Event::end("e")))
            .chain([Event::characters("danach")]);
        let mut forest = nodes_from_events(events.map(Ok));
        let root = forest.next().unwrap().unwrap();
        let mut levels = 0;
        let mut current = root.as_element();
        while let Some(el) = current {
            levels += 1;
            current = el.content().first().and_then(Node::as_element);
        }
        assert_eq!(levels, depth);
        assert_eq!(forest.next(), Some(Ok(Node::text("danach"))));
    }

    #[test]
    fn truncated_stream_closes_open_elements() {
        let events = vec![
            Event::start("a", Attributes::new()),
            Event::start("b", Attributes::new()),
            Event::characters("x"),
        ];
        let nodes = collect_nodes(events).unwrap();
        assert_eq!(
            nodes,
            vec![Node::element(
                "a",
                Attributes::new(),
                [Node::element("b", Attributes::new(), [Node::text("x")])],
            )]
        );
    }

    #[test]
    fn stream_error_is_surfaced_once() {
        let events = vec![
            Ok(Event::start("a", Attributes::new())),
            Ok(Event::characters("x")),
            Err(Error::XmlParseError("kaputt".into())),
            Ok(Event::end("a")),
        ];
        let mut forest = nodes_from_events(events.into_iter());
        assert_eq!(forest.next(), Some(Err(Error::XmlParseError("kaputt".into()))));
        assert_eq!(forest.next(), None);
    }
}
