//! Radix tree shared by the basic and the validating router.
//!
//! Children are bucketed by kind so that match priority falls out of the
//! bucket order: literal, validated parameter, parameter, validated
//! wildcard, wildcard. Within a bucket, insertion order decides.
//!
//! Constant siblings never share a non-empty prefix: inserting a literal that
//! partially overlaps an existing child splits that child at the common
//! prefix. Nodes are never removed.

use crate::params::ParamSink;
use crate::path::longest_common_prefix;
use crate::predicate::Checker;
use crate::route::{RoutePattern, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Const,
    Param,
    ParamValidated,
    Wildcard,
    WildcardValidated,
}

pub(crate) struct Node<H> {
    path: String,
    kind: NodeKind,
    name: String,
    check: Option<Checker>,
    const_children: Vec<Node<H>>,
    param_children: Vec<Node<H>>,
    validated_param_children: Vec<Node<H>>,
    wildcard_child: Option<Box<Node<H>>>,
    validated_wildcard_children: Vec<Node<H>>,
    /// Plain plus validated parameter children
    param_count: usize,
    tags: Vec<String>,
    values: Vec<String>,
    handlers: Option<Vec<H>>,
}

impl<H> Node<H> {
    pub(crate) fn root() -> Self {
        Self::new(String::new(), NodeKind::Const, String::new(), None)
    }

    fn new(path: String, kind: NodeKind, name: String, check: Option<Checker>) -> Self {
        Self {
            path,
            kind,
            name,
            check,
            const_children: Vec::new(),
            param_children: Vec::new(),
            validated_param_children: Vec::new(),
            wildcard_child: None,
            validated_wildcard_children: Vec::new(),
            param_count: 0,
            tags: Vec::new(),
            values: Vec::new(),
            handlers: None,
        }
    }

    /// Insert a parsed route. `checks` is parallel to `route.segments` and
    /// holds the resolved predicate of every validated segment.
    pub(crate) fn insert(&mut self, route: &RoutePattern, checks: &[Option<Checker>], handlers: Vec<H>) {
        let leaf = self.insert_segments(&route.segments, checks);
        leaf.tags.clone_from(&route.tags);
        leaf.values.clone_from(&route.values);
        leaf.handlers = Some(handlers);
    }

    fn insert_segments(&mut self, segments: &[Segment], checks: &[Option<Checker>]) -> &mut Self {
        let (Some((segment, segments)), Some((check, checks))) =
            (segments.split_first(), checks.split_first())
        else {
            return self;
        };

        let child = match segment {
            Segment::Literal(literal) => self.literal_child(literal),
            Segment::Param { spelling, name, .. } => {
                self.param_child(spelling, name, check.clone())
            }
            Segment::Wildcard { spelling, name, .. } => {
                self.wildcard_child(spelling, name, check.clone())
            }
        };
        child.insert_segments(segments, checks)
    }

    fn literal_child(&mut self, literal: &str) -> &mut Self {
        let overlap = self
            .const_children
            .iter()
            .enumerate()
            .map(|(idx, child)| (idx, longest_common_prefix(&child.path, literal)))
            .find(|&(_, common)| common > 0);

        let Some((idx, common)) = overlap else {
            self.const_children.push(Self::new(
                literal.to_string(),
                NodeKind::Const,
                String::new(),
                None,
            ));
            let last = self.const_children.len() - 1;
            return &mut self.const_children[last];
        };

        if common < self.const_children[idx].path.len() {
            self.const_children[idx].split_at(common);
        }

        let child = &mut self.const_children[idx];
        if common == literal.len() {
            child
        } else {
            child.literal_child(&literal[common..])
        }
    }

    /// Turn this node into an interior holding `path[..at]`, re-parenting the
    /// previous node under it with the remaining suffix.
    fn split_at(&mut self, at: usize) {
        let prefix = self.path[..at].to_string();
        let mut tail = std::mem::replace(
            self,
            Self::new(prefix, NodeKind::Const, String::new(), None),
        );
        tail.path.drain(..at);
        self.const_children.push(tail);
    }

    fn param_child(&mut self, spelling: &str, name: &str, check: Option<Checker>) -> &mut Self {
        let validated = check.is_some();
        let bucket = if validated {
            &self.validated_param_children
        } else {
            &self.param_children
        };

        let idx = match bucket.iter().position(|c| c.path == spelling) {
            Some(idx) => idx,
            None => {
                let kind = if validated {
                    NodeKind::ParamValidated
                } else {
                    NodeKind::Param
                };
                let node = Self::new(spelling.to_string(), kind, name.to_string(), check);
                self.param_count += 1;
                let bucket = if validated {
                    &mut self.validated_param_children
                } else {
                    &mut self.param_children
                };
                bucket.push(node);
                bucket.len() - 1
            }
        };

        if validated {
            &mut self.validated_param_children[idx]
        } else {
            &mut self.param_children[idx]
        }
    }

    fn wildcard_child(&mut self, spelling: &str, name: &str, check: Option<Checker>) -> &mut Self {
        if check.is_some() {
            let idx = match self
                .validated_wildcard_children
                .iter()
                .position(|c| c.path == spelling)
            {
                Some(idx) => idx,
                None => {
                    self.validated_wildcard_children.push(Self::new(
                        spelling.to_string(),
                        NodeKind::WildcardValidated,
                        name.to_string(),
                        check,
                    ));
                    self.validated_wildcard_children.len() - 1
                }
            };
            return &mut self.validated_wildcard_children[idx];
        }

        if self
            .wildcard_child
            .as_ref()
            .is_some_and(|c| c.path != spelling)
        {
            self.wildcard_child = None;
        }
        self.wildcard_child.get_or_insert_with(|| {
            Box::new(Self::new(
                spelling.to_string(),
                NodeKind::Wildcard,
                name.to_string(),
                None,
            ))
        })
    }

    /// Walk the tree for `search`, emitting the leaf's tags and then every
    /// bound parameter on the way back up.
    pub(crate) fn find<'a, P>(&'a self, search: &str, params: &mut P) -> Option<&'a [H]>
    where
        P: ParamSink + ?Sized,
    {
        if search.is_empty() {
            if let Some(handlers) = self.handlers.as_deref() {
                self.emit_tags(params);
                return Some(handlers);
            }
        }

        for child in &self.const_children {
            if let Some(rest) = search.strip_prefix(child.path.as_str()) {
                if let Some(handlers) = child.find(rest, params) {
                    return Some(handlers);
                }
            }
        }

        if self.param_count > 0 && !search.is_empty() {
            let (segment, rest) = search.split_at(search.find('/').unwrap_or(search.len()));
            if !segment.is_empty() {
                let validated = self
                    .validated_param_children
                    .iter()
                    .filter(|child| child.accepts(segment));
                for child in validated.chain(&self.param_children) {
                    if let Some(handlers) = child.find(rest, params) {
                        params.add_param(&child.name, segment);
                        return Some(handlers);
                    }
                }
            }
        }

        let wildcards = self
            .validated_wildcard_children
            .iter()
            .filter(|child| child.accepts(search))
            .chain(self.wildcard_child.as_deref());
        for child in wildcards {
            if let Some(handlers) = child.handlers.as_deref() {
                child.emit_tags(params);
                params.add_param(&child.name, search);
                return Some(handlers);
            }
        }

        None
    }

    fn accepts(&self, input: &str) -> bool {
        match (self.kind, &self.check) {
            (NodeKind::ParamValidated | NodeKind::WildcardValidated, Some(check)) => check(input),
            _ => true,
        }
    }

    fn emit_tags<P: ParamSink + ?Sized>(&self, params: &mut P) {
        for (tag, value) in self.tags.iter().zip(&self.values) {
            params.add_param(tag, value);
        }
    }

    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize {
        1 + self
            .const_children
            .iter()
            .chain(&self.param_children)
            .chain(&self.validated_param_children)
            .chain(&self.validated_wildcard_children)
            .chain(self.wildcard_child.as_deref())
            .map(Self::node_count)
            .sum::<usize>()
    }

    #[cfg(test)]
    pub(crate) fn const_paths(&self) -> Vec<&str> {
        self.const_children.iter().map(|c| c.path.as_str()).collect()
    }

    #[cfg(test)]
    pub(crate) fn const_child(&self, path: &str) -> Option<&Self> {
        self.const_children.iter().find(|c| c.path == path)
    }

    #[cfg(test)]
    pub(crate) const fn kind(&self) -> NodeKind {
        self.kind
    }
}
