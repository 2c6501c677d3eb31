//! Elaboration of parsed schema files into a [`Schema`].
//!
//! Every struct, group and enum is declared before anything else, so types
//! may be referenced before they appear in the file. Field types are then
//! resolved, ordinals checked, union discriminants assigned, fields laid out,
//! and finally default values are checked against their field types.

use codespan_reporting::diagnostic::Diagnostic;
use fxhash::FxHashMap;

use crate::schema::{Annotation, EnumId, EnumNode, Field, NodeId, Schema, StructNode, Type};
use crate::source::{ByteRange, FileId};
use crate::surface::{
    AnnotationUse, EnumDecl, FieldDecl, File, Ident, Item, Literal, LiteralKind, Member, Ordinal,
    StructDecl, TypeExpr, UnionDecl,
};
use crate::value::{Args, Input};

mod layout;
mod reporting;

use self::layout::{StructLayout, UnionId};
use self::reporting::Message;

const BUILTIN_TYPES: &[&str] = &[
    "Void", "Bool", "Int8", "Int16", "Int32", "Int64", "UInt8", "UInt16", "UInt32", "UInt64",
    "Float32", "Float64", "Text", "Data",
];

fn builtin_type(name: &str) -> Option<Type> {
    match name {
        "Void" => Some(Type::Void),
        "Bool" => Some(Type::Bool),
        "Int8" => Some(Type::Int8),
        "Int16" => Some(Type::Int16),
        "Int32" => Some(Type::Int32),
        "Int64" => Some(Type::Int64),
        "UInt8" => Some(Type::UInt8),
        "UInt16" => Some(Type::UInt16),
        "UInt32" => Some(Type::UInt32),
        "UInt64" => Some(Type::UInt64),
        "Float32" => Some(Type::Float32),
        "Float64" => Some(Type::Float64),
        "Text" => Some(Type::Text),
        "Data" => Some(Type::Data),
        _ => None,
    }
}

/// Elaborate a parsed file, reporting every problem found.
pub fn elaborate(file_id: FileId, file: &File) -> Result<Schema, Vec<Diagnostic<FileId>>> {
    let mut context = Context::new(file_id);
    context.declare_file(file);
    context.resolve_types();
    if !context.messages.is_empty() {
        return Err(context.diagnostics());
    }

    let roots = (0..context.nodes.len())
        .filter(|index| !context.nodes[*index].is_group)
        .map(|index| NodeId(index as u32))
        .collect::<Vec<_>>();
    for root in &roots {
        context.check_ordinals(*root);
        context.assign_discriminants(*root);
    }
    if !context.messages.is_empty() {
        return Err(context.diagnostics());
    }
    for root in &roots {
        context.lay_out(*root);
    }

    context.lower_defaults();
    context.finish(file.id)
}

type ScopeId = usize;

#[derive(Copy, Clone, Debug)]
enum Named {
    Struct(NodeId),
    Enum(EnumId),
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    items: FxHashMap<String, (Named, ByteRange)>,
}

struct NodeDraft<'ast> {
    name: String,
    name_range: ByteRange,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    is_group: bool,
    /// Where the types of this node's fields are looked up.
    scope: ScopeId,
    /// Nested declarations. Groups have none of their own.
    own_scope: Option<ScopeId>,
    fields: Vec<FieldDraft<'ast>>,
    union: Option<UnionDraft>,
    data_words: u16,
    pointers: u16,
}

struct FieldDraft<'ast> {
    name: String,
    ordinal: Option<Ordinal>,
    /// `None` for groups and named unions.
    decl: Option<&'ast FieldDecl>,
    r#type: Type,
    offset: u32,
    default: Option<Input>,
    in_union: bool,
    discriminant: Option<u16>,
    annotations: Vec<Annotation>,
}

struct UnionDraft {
    range: ByteRange,
    /// Allocated once a second member is given space.
    offset: Option<u32>,
    count: u16,
}

pub struct Context<'ast> {
    file_id: FileId,
    scopes: Vec<Scope>,
    nodes: Vec<NodeDraft<'ast>>,
    enums: Vec<EnumNode>,
    messages: Vec<Message>,
}

impl<'ast> Context<'ast> {
    pub fn new(file_id: FileId) -> Context<'ast> {
        Context {
            file_id,
            scopes: Vec::new(),
            nodes: Vec::new(),
            enums: Vec::new(),
            messages: Vec::new(),
        }
    }

    fn diagnostics(&self) -> Vec<Diagnostic<FileId>> {
        self.messages.iter().map(Message::to_diagnostic).collect()
    }

    // Declarations

    fn declare_file(&mut self, file: &'ast File) {
        let scope = self.push_scope(None);
        for item in &file.items {
            match item {
                Item::Struct(decl) => self.declare_struct(decl, None, scope),
                Item::Enum(decl) => self.declare_enum(decl, scope),
            }
        }
        tracing::debug!(
            file_id = self.file_id,
            structs = self.nodes.len(),
            enums = self.enums.len(),
            "declared schema items"
        );
    }

    fn push_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Scope {
            parent,
            items: FxHashMap::default(),
        });
        self.scopes.len() - 1
    }

    fn define_name(&mut self, scope: ScopeId, ident: &Ident, named: Named) {
        let items = &mut self.scopes[scope].items;
        match items.get(&ident.name) {
            Some((_, previous)) => self.messages.push(Message::DuplicateName {
                range: ident.range,
                previous: *previous,
                name: ident.name.clone(),
            }),
            None => {
                items.insert(ident.name.clone(), (named, ident.range));
            }
        }
    }

    fn push_node(
        &mut self,
        name: &Ident,
        parent: Option<NodeId>,
        is_group: bool,
        scope: ScopeId,
        own_scope: Option<ScopeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeDraft {
            name: name.name.clone(),
            name_range: name.range,
            parent,
            children: Vec::new(),
            is_group,
            scope,
            own_scope,
            fields: Vec::new(),
            union: None,
            data_words: 0,
            pointers: 0,
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    fn declare_struct(&mut self, decl: &'ast StructDecl, parent: Option<NodeId>, scope: ScopeId) {
        let own_scope = self.push_scope(Some(scope));
        let id = self.push_node(&decl.name, parent, false, own_scope, Some(own_scope));
        self.define_name(scope, &decl.name, Named::Struct(id));
        self.declare_members(id, &decl.members, false, true);
    }

    fn declare_enum(&mut self, decl: &EnumDecl, scope: ScopeId) {
        let id = EnumId(self.enums.len() as u32);
        self.define_name(scope, &decl.name, Named::Enum(id));

        let ordinals = decl.enumerants.iter().map(|e| e.ordinal).collect::<Vec<_>>();
        let mut enumerants = decl
            .enumerants
            .iter()
            .map(|enumerant| (enumerant.ordinal.value, enumerant.name.name.clone()))
            .collect::<Vec<_>>();
        enumerants.sort_by_key(|(ordinal, _)| *ordinal);
        self.check_sequence(decl.name.range, &ordinals);

        self.enums.push(EnumNode {
            id,
            name: decl.name.name.clone(),
            enumerants: enumerants.into_iter().map(|(_, name)| name).collect(),
        });
    }

    fn push_field(&mut self, node: NodeId, field: FieldDraft<'ast>) {
        self.nodes[node.index()].fields.push(field);
    }

    fn declare_members(
        &mut self,
        node: NodeId,
        members: &'ast [Member],
        in_union: bool,
        allow_declarations: bool,
    ) {
        let scope = self.nodes[node.index()].scope;
        for member in members {
            match member {
                Member::Struct(decl) if allow_declarations => {
                    self.declare_struct(decl, Some(node), scope)
                }
                Member::Enum(decl) if allow_declarations => self.declare_enum(decl, scope),
                Member::Struct(StructDecl { range, .. }) | Member::Enum(EnumDecl { range, .. }) => {
                    self.messages
                        .push(Message::NestedDeclaration { range: *range })
                }
                Member::Field(decl) => self.push_field(
                    node,
                    FieldDraft {
                        name: decl.name.name.clone(),
                        ordinal: Some(decl.ordinal),
                        decl: Some(decl),
                        r#type: Type::Void,
                        offset: 0,
                        default: None,
                        in_union,
                        discriminant: None,
                        annotations: annotations(&decl.annotations),
                    },
                ),
                Member::Group(decl) => {
                    let group = self.push_node(&decl.name, Some(node), true, scope, None);
                    self.push_field(node, group_field(&decl.name, group, in_union, &decl.annotations));
                    self.declare_members(group, &decl.members, false, false);
                }
                Member::Union(UnionDecl {
                    range,
                    name: Some(name),
                    annotations,
                    members,
                }) => {
                    let group = self.push_node(name, Some(node), true, scope, None);
                    self.nodes[group.index()].union = Some(UnionDraft::new(*range));
                    self.push_field(node, group_field(name, group, in_union, annotations));
                    self.declare_members(group, members, true, false);
                }
                Member::Union(UnionDecl {
                    range,
                    name: None,
                    members,
                    ..
                }) => {
                    if in_union || self.nodes[node.index()].union.is_some() {
                        self.messages.push(Message::UnexpectedUnion { range: *range });
                        continue;
                    }
                    self.nodes[node.index()].union = Some(UnionDraft::new(*range));
                    self.declare_members(node, members, true, false);
                }
            }
        }
    }

    // Name resolution

    fn resolve_types(&mut self) {
        for node in 0..self.nodes.len() {
            for field in 0..self.nodes[node].fields.len() {
                let decl = match self.nodes[node].fields[field].decl {
                    Some(decl) => decl,
                    None => continue,
                };
                let scope = self.nodes[node].scope;
                if let Some(r#type) = self.resolve_type(scope, &decl.r#type) {
                    self.nodes[node].fields[field].r#type = r#type;
                }
            }
        }
    }

    fn resolve_type(&mut self, scope: ScopeId, expr: &TypeExpr) -> Option<Type> {
        let path = match expr {
            TypeExpr::List(_, elem) => {
                let elem = self.resolve_type(scope, elem)?;
                return Some(Type::List(Box::new(elem)));
            }
            TypeExpr::Name(path) => path,
        };

        if let [ident] = path.as_slice() {
            if let Some(builtin) = builtin_type(&ident.name) {
                return Some(builtin);
            }
        }

        let (first, rest) = path.split_first()?;
        let mut named = self.lookup(scope, first)?;
        for (index, ident) in rest.iter().enumerate() {
            let qualified = || dotted(&path[..=index]);
            let own_scope = match named {
                Named::Struct(id) => self.nodes[id.index()].own_scope,
                Named::Enum(_) => None,
            };
            let own_scope = match own_scope {
                Some(own_scope) => own_scope,
                None => {
                    let range = path[0].range.merge(path[index].range);
                    let name = qualified();
                    self.messages.push(Message::NotAScope { range, name });
                    return None;
                }
            };
            named = match self.scopes[own_scope].items.get(&ident.name) {
                Some((named, _)) => *named,
                None => {
                    let candidates = self.scopes[own_scope].items.keys().map(String::as_str);
                    let suggestion = suggest(&ident.name, candidates);
                    self.messages.push(Message::UnknownType {
                        range: ident.range,
                        name: dotted(&path[..=index + 1]),
                        suggestion,
                    });
                    return None;
                }
            };
        }

        Some(match named {
            Named::Struct(id) => Type::Struct(id),
            Named::Enum(id) => Type::Enum(id),
        })
    }

    fn lookup(&mut self, scope: ScopeId, ident: &Ident) -> Option<Named> {
        let mut current = Some(scope);
        while let Some(scope) = current {
            if let Some((named, _)) = self.scopes[scope].items.get(&ident.name) {
                return Some(*named);
            }
            current = self.scopes[scope].parent;
        }

        let mut candidates = BUILTIN_TYPES.to_vec();
        let mut current = Some(scope);
        while let Some(scope) = current {
            candidates.extend(self.scopes[scope].items.keys().map(String::as_str));
            current = self.scopes[scope].parent;
        }
        let suggestion = suggest(&ident.name, candidates.into_iter());
        self.messages.push(Message::UnknownType {
            range: ident.range,
            name: ident.name.clone(),
            suggestion,
        });
        None
    }

    // Ordinals and discriminants

    /// The node and the groups sharing its data and pointer regions, in
    /// declaration order.
    fn region_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut nodes = vec![root];
        let mut index = 0;
        while index < nodes.len() {
            let node = &self.nodes[nodes[index].index()];
            let groups = node.fields.iter().filter_map(|field| match field.r#type {
                Type::Group(group) => Some(group),
                _ => None,
            });
            nodes.extend(groups.collect::<Vec<_>>());
            index += 1;
        }
        nodes
    }

    fn check_ordinals(&mut self, root: NodeId) {
        let ordinals = self
            .region_nodes(root)
            .into_iter()
            .flat_map(|node| self.nodes[node.index()].fields.iter())
            .filter_map(|field| field.ordinal)
            .collect::<Vec<_>>();
        let range = self.nodes[root.index()].name_range;
        self.check_sequence(range, &ordinals);
    }

    /// Ordinals must be distinct and cover `0..ordinals.len()`.
    fn check_sequence(&mut self, range: ByteRange, ordinals: &[Ordinal]) {
        let mut seen = FxHashMap::<u16, ByteRange>::default();
        for ordinal in ordinals {
            if let Some(previous) = seen.insert(ordinal.value, ordinal.range) {
                self.messages.push(Message::DuplicateOrdinal {
                    range: ordinal.range,
                    previous,
                    ordinal: ordinal.value,
                });
            }
        }
        let missing = (0..ordinals.len() as u32).find(|ordinal| match u16::try_from(*ordinal) {
            Ok(ordinal) => !seen.contains_key(&ordinal),
            Err(_) => true,
        });
        if let Some(ordinal) = missing.and_then(|ordinal| u16::try_from(ordinal).ok()) {
            self.messages.push(Message::MissingOrdinal { range, ordinal });
        }
    }

    /// The lowest ordinal in a field, looking inside groups.
    fn min_ordinal(&self, field: &FieldDraft<'_>) -> Option<u16> {
        match (field.ordinal, &field.r#type) {
            (Some(ordinal), _) => Some(ordinal.value),
            (None, Type::Group(group)) => self.nodes[group.index()]
                .fields
                .iter()
                .filter_map(|field| self.min_ordinal(field))
                .min(),
            (None, _) => None,
        }
    }

    /// Number the members of each union in the order of their ordinals.
    fn assign_discriminants(&mut self, root: NodeId) {
        for node in self.region_nodes(root) {
            let draft = &self.nodes[node.index()];
            let union_range = match &draft.union {
                Some(union) => union.range,
                None => continue,
            };

            let mut members = Vec::new();
            for (index, field) in draft.fields.iter().enumerate() {
                if !field.in_union {
                    continue;
                }
                match self.min_ordinal(field) {
                    Some(ordinal) => members.push((ordinal, index)),
                    None => {
                        let range = match field.r#type {
                            Type::Group(group) => self.nodes[group.index()].name_range,
                            _ => union_range,
                        };
                        self.messages.push(Message::EmptyGroup { range });
                    }
                }
            }
            members.sort_unstable();

            if members.len() < 2 {
                self.messages.push(Message::UnionTooSmall { range: union_range });
            }
            let draft = &mut self.nodes[node.index()];
            for (discriminant, (_, index)) in members.iter().enumerate() {
                draft.fields[*index].discriminant = Some(discriminant as u16);
            }
            if let Some(union) = &mut draft.union {
                union.count = members.len() as u16;
            }
        }
    }

    // Layout

    /// Allocate the fields of a struct and its groups in ordinal order.
    fn lay_out(&mut self, root: NodeId) {
        let mut layout = StructLayout::new();
        let mut unions = FxHashMap::<usize, UnionId>::default();
        let mut scopes = FxHashMap::<(usize, usize), ScopeId>::default();
        self.assign_scopes(root, StructLayout::TOP, &mut layout, &mut unions, &mut scopes);

        let nodes = self.region_nodes(root);
        let mut leaves = Vec::new();
        for node in &nodes {
            for (index, field) in self.nodes[node.index()].fields.iter().enumerate() {
                if let Some(ordinal) = field.ordinal {
                    leaves.push((ordinal.value, *node, index));
                }
            }
        }
        leaves.sort_unstable();

        for (_, node, index) in leaves {
            let scope = (scopes.get(&(node.index(), index)).copied())
                .unwrap_or(StructLayout::TOP);
            let field = &mut self.nodes[node.index()].fields[index];
            field.offset = match field.r#type.lg_bits() {
                Some(lg_bits) => layout.add_data(scope, lg_bits),
                None if field.r#type.is_pointer() => layout.add_pointer(scope),
                None => {
                    layout.add_void(scope);
                    0
                }
            };
        }

        for node in &nodes {
            let draft = &mut self.nodes[node.index()];
            draft.data_words = layout.data_words();
            draft.pointers = layout.pointers();
            if let (Some(union), Some(id)) = (&mut draft.union, unions.get(&node.index())) {
                union.offset = layout.discriminant(*id);
            }
        }
        tracing::trace!(
            name = self.nodes[root.index()].name.as_str(),
            data_words = layout.data_words(),
            pointers = layout.pointers(),
            "laid out struct"
        );
    }

    /// Decide which layout scope each field is allocated from. Union members
    /// get a scope each, and other groups share their parent's.
    fn assign_scopes(
        &self,
        node: NodeId,
        scope: ScopeId,
        layout: &mut StructLayout,
        unions: &mut FxHashMap<usize, UnionId>,
        scopes: &mut FxHashMap<(usize, usize), ScopeId>,
    ) {
        let draft = &self.nodes[node.index()];
        let union = draft.union.as_ref().map(|_| layout.add_union(scope));
        if let Some(union) = union {
            unions.insert(node.index(), union);
        }

        for (index, field) in draft.fields.iter().enumerate() {
            let field_scope = match union {
                Some(union) if field.in_union => layout.add_member(union),
                _ => scope,
            };
            match field.r#type {
                Type::Group(group) => self.assign_scopes(group, field_scope, layout, unions, scopes),
                _ => {
                    scopes.insert((node.index(), index), field_scope);
                }
            }
        }
    }

    // Defaults

    fn lower_defaults(&mut self) {
        for node in 0..self.nodes.len() {
            for index in 0..self.nodes[node].fields.len() {
                let field = &self.nodes[node].fields[index];
                let literal = match field.decl.and_then(|decl| decl.default.as_ref()) {
                    Some(literal) => literal,
                    None => continue,
                };
                match self.lower_literal(literal, &field.r#type) {
                    Ok(input) => self.nodes[node].fields[index].default = Some(input),
                    Err(message) => self.messages.push(message),
                }
            }
        }
    }

    fn lower_literal(&self, literal: &Literal, r#type: &Type) -> Result<Input, Message> {
        let out_of_range = || Message::IntegerOutOfRange {
            range: literal.range,
            expected_type: self.type_name(r#type),
        };

        match (r#type, &literal.kind) {
            (Type::Void, LiteralKind::Name(name)) if name == "void" => Ok(Input::Void),
            (Type::Bool, LiteralKind::Bool(value)) => Ok(Input::Bool(*value)),
            (
                Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64,
                LiteralKind::Integer {
                    negative,
                    magnitude,
                },
            ) => {
                let bits = 1 << r#type.lg_bits().unwrap_or(6);
                let value = signed_value(*negative, *magnitude);
                let min = -(1i128 << (bits - 1));
                let max = (1i128 << (bits - 1)) - 1;
                match i64::try_from(value) {
                    Ok(value) if (min..=max).contains(&i128::from(value)) => Ok(Input::Int(value)),
                    _ => Err(out_of_range()),
                }
            }
            (
                Type::UInt8 | Type::UInt16 | Type::UInt32 | Type::UInt64,
                LiteralKind::Integer {
                    negative,
                    magnitude,
                },
            ) => {
                let bits = 1 << r#type.lg_bits().unwrap_or(6);
                let fits = bits == 64 || *magnitude < (1u64 << bits);
                match negative {
                    false if fits => Ok(Input::UInt(*magnitude)),
                    // `-0` is still zero.
                    true if *magnitude == 0 => Ok(Input::UInt(0)),
                    _ => Err(out_of_range()),
                }
            }
            (Type::Float32 | Type::Float64, kind) => {
                let value = match kind {
                    LiteralKind::Float(value) => *value,
                    LiteralKind::Integer {
                        negative,
                        magnitude,
                    } => signed_value(*negative, *magnitude) as f64,
                    LiteralKind::Name(name) if name == "inf" => f64::INFINITY,
                    LiteralKind::Name(name) if name == "nan" => f64::NAN,
                    _ => return Err(self.mismatched(literal, r#type)),
                };
                match r#type {
                    Type::Float32 => Ok(Input::Float32(value as f32)),
                    _ => Ok(Input::Float64(value)),
                }
            }
            (Type::Enum(id), LiteralKind::Name(name)) => {
                let node = &self.enums[id.index()];
                match node.enumerants.iter().position(|e| e == name) {
                    Some(ordinal) => Ok(Input::Enum(ordinal as u16)),
                    None => Err(Message::UnknownEnumerant {
                        range: literal.range,
                        name: name.clone(),
                        enum_name: node.name.clone(),
                        suggestion: suggest(name, node.enumerants.iter().map(String::as_str)),
                    }),
                }
            }
            (Type::Text, LiteralKind::Text(text)) => Ok(Input::Text(text.clone())),
            (Type::Data, LiteralKind::Text(text)) => Ok(Input::Data(text.as_bytes().to_vec())),
            (Type::List(elem), LiteralKind::List(items)) => {
                let items = items.iter().map(|item| self.lower_literal(item, elem));
                Ok(Input::List(items.collect::<Result<_, _>>()?))
            }
            (Type::Struct(id) | Type::Group(id), LiteralKind::Record(entries)) => {
                let node = &self.nodes[id.index()];
                let mut args = Args::new();
                for (name, value) in entries {
                    let field = node.fields.iter().find(|field| field.name == name.name);
                    let field = field.ok_or_else(|| Message::UnknownField {
                        range: name.range,
                        name: name.name.clone(),
                        struct_name: node.name.clone(),
                    })?;
                    args.insert(name.name.clone(), self.lower_literal(value, &field.r#type)?);
                }
                Ok(Input::Record(args))
            }
            (_, _) => Err(self.mismatched(literal, r#type)),
        }
    }

    fn mismatched(&self, literal: &Literal, r#type: &Type) -> Message {
        Message::MismatchedDefault {
            range: literal.range,
            expected_type: self.type_name(r#type),
        }
    }

    fn type_name(&self, r#type: &Type) -> String {
        match r#type {
            Type::Enum(id) => self.enums[id.index()].name.clone(),
            Type::Struct(id) => self.nodes[id.index()].name.clone(),
            Type::Group(_) => "group".to_owned(),
            Type::List(elem) => format!("List({})", self.type_name(elem)),
            r#type => r#type.to_string(),
        }
    }

    fn finish(self, file_id: Option<u64>) -> Result<Schema, Vec<Diagnostic<FileId>>> {
        if !self.messages.is_empty() {
            return Err(self.diagnostics());
        }

        let nodes = self.nodes.into_iter().enumerate().map(|(index, draft)| {
            let (discriminant_count, discriminant_offset) = match draft.union {
                Some(union) => (union.count, union.offset.unwrap_or(0)),
                None => (0, 0),
            };
            let fields = draft.fields.into_iter().map(|field| Field {
                name: field.name,
                ordinal: field.ordinal.map(|ordinal| ordinal.value),
                r#type: field.r#type,
                offset: field.offset,
                default: field.default,
                discriminant_value: field.discriminant,
                annotations: field.annotations,
            });
            StructNode {
                id: NodeId(index as u32),
                name: draft.name,
                parent: draft.parent,
                children: draft.children,
                data_word_count: draft.data_words,
                pointer_count: draft.pointers,
                discriminant_count,
                discriminant_offset,
                is_group: draft.is_group,
                fields: fields.collect(),
            }
        });

        Ok(Schema {
            file_id,
            nodes: nodes.collect(),
            enums: self.enums,
        })
    }
}

impl UnionDraft {
    fn new(range: ByteRange) -> UnionDraft {
        UnionDraft {
            range,
            offset: None,
            count: 0,
        }
    }
}

fn group_field<'ast>(
    name: &Ident,
    group: NodeId,
    in_union: bool,
    annotation_uses: &[AnnotationUse],
) -> FieldDraft<'ast> {
    FieldDraft {
        name: name.name.clone(),
        ordinal: None,
        decl: None,
        r#type: Type::Group(group),
        offset: 0,
        default: None,
        in_union,
        discriminant: None,
        annotations: annotations(annotation_uses),
    }
}

fn annotations(uses: &[AnnotationUse]) -> Vec<Annotation> {
    let annotation = |use_: &AnnotationUse| match use_.path.last() {
        Some(last) if last.name == "nullable" => Annotation::Nullable,
        _ => Annotation::Other(use_.dotted_name()),
    };
    uses.iter().map(annotation).collect()
}

fn dotted(path: &[Ident]) -> String {
    let names = path.iter().map(|ident| ident.name.as_str());
    names.collect::<Vec<_>>().join(".")
}

fn signed_value(negative: bool, magnitude: u64) -> i128 {
    match negative {
        true => -i128::from(magnitude),
        false => i128::from(magnitude),
    }
}

/// The closest candidate within an edit distance of two, preferring the
/// alphabetically first on ties.
fn suggest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    candidates
        .filter(|candidate| *candidate != name)
        .map(|candidate| (levenshtein::levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance <= 2)
        .min()
        .map(|(_, candidate)| candidate.to_owned())
}
