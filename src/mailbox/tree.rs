//! Mailbox tree builder
//!
//! The tree is an arena: the id-keyed map owns every node, parent/child
//! relations are ids into that map. That keeps ownership flat even when the
//! server hands us a parent cycle, and makes cycle detection a plain
//! visited-set walk. Building is order-independent: any permutation of the
//! same flat list yields identical paths, role mapping and aggregates.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use serde::Serialize;
use tracing::debug;

use super::{Mailbox, Role};

/// Inconsistencies recovered during the build; never fatal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TreeDiagnostic {
    /// The node named a parent id absent from the list; it was demoted to a root
    DanglingParent { id: String, parent_id: String },
    /// Following parent links revisited this node; it was demoted to a root
    CycleBroken { id: String },
}

/// One mailbox plus its computed place in the forest
#[derive(Debug, Clone, PartialEq)]
pub struct MailboxNode {
    /// The raw server record
    pub mailbox: Mailbox,
    /// Child ids, sorted by (sort order, name, id)
    pub children: Vec<String>,
    /// Slash-joined ancestor names ending in this node's name
    pub path: String,
    /// 0 for roots
    pub depth: usize,
}

impl MailboxNode {
    pub fn id(&self) -> &str {
        &self.mailbox.id
    }

    pub fn name(&self) -> &str {
        &self.mailbox.name
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Aggregate counts across the whole forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub mailbox_count: usize,
    pub root_count: usize,
    /// Sum of own (non-recursive) totals
    pub total_emails: u64,
    /// Sum of own (non-recursive) unread counts
    pub unread_emails: u64,
    /// Levels in the deepest branch; 0 for an empty tree
    pub max_depth: usize,
}

/// Rooted forest over the flat `Mailbox/get` list
#[derive(Debug, Clone, PartialEq)]
pub struct MailboxTree {
    nodes: HashMap<String, MailboxNode>,
    roots: Vec<String>,
    by_role: HashMap<Role, String>,
    by_path: HashMap<String, String>,
    diagnostics: Vec<TreeDiagnostic>,
}

impl MailboxTree {
    /// Build the forest from the flat record list.
    ///
    /// Never fails: a dangling parent demotes the node to a root, a parent
    /// cycle is broken at the revisited node. Both are recorded in
    /// [`diagnostics`](Self::diagnostics) so callers can surface them.
    pub fn build(mailboxes: Vec<Mailbox>) -> Self {
        let mut nodes: HashMap<String, MailboxNode> = HashMap::with_capacity(mailboxes.len());
        for mailbox in mailboxes {
            let id = mailbox.id.clone();
            let node = MailboxNode {
                mailbox,
                children: Vec::new(),
                path: String::new(),
                depth: 0,
            };
            if nodes.insert(id.clone(), node).is_some() {
                debug!(%id, "duplicate mailbox id in server list, keeping the last record");
            }
        }

        // Sorted id order makes every later decision (cycle breaking, role
        // tie-breaks) independent of the input ordering.
        let mut ids: Vec<String> = nodes.keys().cloned().collect();
        ids.sort_unstable();

        let mut diagnostics = Vec::new();

        // Effective parent links: dangling references demote to root.
        let mut parent: HashMap<String, Option<String>> = HashMap::with_capacity(ids.len());
        for id in &ids {
            let effective = match nodes[id].mailbox.parent_id.clone() {
                Some(parent_id) if nodes.contains_key(&parent_id) => Some(parent_id),
                Some(parent_id) => {
                    debug!(%id, %parent_id, "mailbox parent not in list, demoting to root");
                    diagnostics.push(TreeDiagnostic::DanglingParent {
                        id: id.clone(),
                        parent_id,
                    });
                    None
                }
                None => None,
            };
            parent.insert(id.clone(), effective);
        }

        // Cycle breaking: walk parent chains with a visited set. A node seen
        // twice on the current chain becomes a root. Chains already proven
        // acyclic are skipped via `resolved`.
        let mut resolved: HashSet<String> = HashSet::with_capacity(ids.len());
        for id in &ids {
            if resolved.contains(id) {
                continue;
            }
            let mut chain: Vec<String> = Vec::new();
            let mut on_chain: HashSet<String> = HashSet::new();
            let mut current = id.clone();
            loop {
                if resolved.contains(&current) {
                    break;
                }
                if !on_chain.insert(current.clone()) {
                    debug!(id = %current, "mailbox parent cycle, demoting to root");
                    parent.insert(current.clone(), None);
                    diagnostics.push(TreeDiagnostic::CycleBroken { id: current });
                    break;
                }
                chain.push(current.clone());
                match parent.get(&current).cloned().flatten() {
                    Some(next) => current = next,
                    None => break,
                }
            }
            resolved.extend(chain);
        }

        // Deterministic sibling order before wiring children.
        let order_key = |id: &String| {
            let node = &nodes[id];
            (node.mailbox.sort_order, node.mailbox.name.clone(), id.clone())
        };

        let mut roots: Vec<String> = Vec::new();
        let mut edges: Vec<(String, String)> = Vec::new();
        for id in &ids {
            match parent.get(id).cloned().flatten() {
                Some(parent_id) => edges.push((parent_id, id.clone())),
                None => roots.push(id.clone()),
            }
        }
        roots.sort_by_key(|id| order_key(id));
        edges.sort_by_key(|(_, child)| order_key(child));
        for (parent_id, child_id) in edges {
            if let Some(node) = nodes.get_mut(&parent_id) {
                node.children.push(child_id);
            }
        }

        // Preorder walk assigns paths and depths; parents are always visited
        // before their children, so the parent path is ready when needed.
        let mut by_path: HashMap<String, String> = HashMap::with_capacity(ids.len());
        let mut stack: Vec<String> = roots.iter().rev().cloned().collect();
        while let Some(id) = stack.pop() {
            let (path, depth, children) = {
                let node = &nodes[&id];
                let (path, depth) = match parent.get(&id).and_then(|p| p.as_ref()) {
                    Some(parent_id) => {
                        let parent_node = &nodes[parent_id];
                        (
                            format!("{}/{}", parent_node.path, node.mailbox.name),
                            parent_node.depth + 1,
                        )
                    }
                    None => (node.mailbox.name.clone(), 0),
                };
                (path, depth, node.children.clone())
            };
            by_path.entry(path.clone()).or_insert_with(|| id.clone());
            if let Some(node) = nodes.get_mut(&id) {
                node.path = path;
                node.depth = depth;
            }
            for child in children.iter().rev() {
                stack.push(child.clone());
            }
        }

        // Role index: first (lowest) id wins when two nodes claim a role.
        let mut by_role: HashMap<Role, String> = HashMap::new();
        for id in &ids {
            if let Some(role) = nodes[id].mailbox.parsed_role() {
                by_role.entry(role).or_insert_with(|| id.clone());
            }
        }

        Self {
            nodes,
            roots,
            by_role,
            by_path,
            diagnostics,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by mailbox id.
    pub fn get(&self, id: &str) -> Option<&MailboxNode> {
        self.nodes.get(id)
    }

    /// Root nodes in display order.
    pub fn roots(&self) -> impl Iterator<Item = &MailboxNode> {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Children of a node in display order.
    pub fn children(&self, id: &str) -> Vec<&MailboxNode> {
        self.nodes
            .get(id)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|child| self.nodes.get(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Best node for a special-use role.
    pub fn get_by_role(&self, role: Role) -> Option<&MailboxNode> {
        self.by_role.get(&role).and_then(|id| self.nodes.get(id))
    }

    /// First node with this display name, depth-first over the forest.
    pub fn get_by_name(&self, name: &str) -> Option<&MailboxNode> {
        let mut stack: Vec<&str> = self.roots.iter().rev().map(String::as_str).collect();
        while let Some(id) = stack.pop() {
            let node = self.nodes.get(id)?;
            if node.mailbox.name == name {
                return Some(node);
            }
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        None
    }

    /// Exact match on the slash-joined path, e.g. `"Inbox/Projects/Q1"`.
    pub fn find_by_path(&self, path: &str) -> Option<&MailboxNode> {
        self.by_path.get(path).and_then(|id| self.nodes.get(id))
    }

    /// Own total plus the recursive totals of all descendants.
    pub fn total_recursive(&self, id: &str) -> u64 {
        self.sum_recursive(id, |mailbox| mailbox.total_emails)
    }

    /// Own unread count plus the recursive unread counts of all descendants.
    pub fn unread_recursive(&self, id: &str) -> u64 {
        self.sum_recursive(id, |mailbox| mailbox.unread_emails)
    }

    fn sum_recursive(&self, id: &str, field: impl Fn(&Mailbox) -> u64) -> u64 {
        let mut sum = 0;
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                sum += field(&node.mailbox);
                stack.extend(node.children.iter().map(String::as_str));
            }
        }
        sum
    }

    /// Inconsistencies recovered during the build.
    pub fn diagnostics(&self) -> &[TreeDiagnostic] {
        &self.diagnostics
    }

    /// Aggregate counts across all nodes.
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            mailbox_count: self.nodes.len(),
            root_count: self.roots.len(),
            total_emails: self.nodes.values().map(|n| n.mailbox.total_emails).sum(),
            unread_emails: self.nodes.values().map(|n| n.mailbox.unread_emails).sum(),
            max_depth: self
                .nodes
                .values()
                .map(|n| n.depth + 1)
                .max()
                .unwrap_or_default(),
        }
    }

    /// Indented text listing of the forest with own counts, for debugging
    /// and CLI display.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<&str> = self.roots.iter().rev().map(String::as_str).collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                let _ = writeln!(
                    out,
                    "{}{} ({} unread, {} total)",
                    "  ".repeat(node.depth),
                    node.mailbox.name,
                    node.mailbox.unread_emails,
                    node.mailbox.total_emails,
                );
                for child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }
}
