//! Union discriminants and union-aware construction.

use crate::binary::Builder;
use crate::compile::structor::{Param, Region, Structor, Tag};
use crate::error::{ConfigurationError, ConstructError};
use crate::module::{Accessor, Module};
use crate::schema::StructNode;
use crate::value::Args;

/// The discriminant of a union, and the names of its members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnionTag {
    offset: u32,
    names: Vec<String>,
}

impl UnionTag {
    /// Build the tag of a node with a non-zero discriminant count. The member
    /// discriminants must cover `0..discriminant_count` exactly once.
    pub(crate) fn build(node: &StructNode) -> Result<UnionTag, ConfigurationError> {
        let count = node.discriminant_count;
        let mut names: Vec<Option<&str>> = vec![None; usize::from(count)];

        for field in &node.fields {
            let value = match field.discriminant_value {
                Some(value) => value,
                None => continue,
            };
            let slot = names.get_mut(usize::from(value)).ok_or_else(|| {
                ConfigurationError::DiscriminantOutOfRange {
                    struct_name: node.name.clone(),
                    field: field.name.clone(),
                    value,
                    count,
                }
            })?;
            if let Some(first) = slot {
                return Err(ConfigurationError::DuplicateDiscriminant {
                    struct_name: node.name.clone(),
                    first: (*first).to_owned(),
                    second: field.name.clone(),
                    value,
                });
            }
            *slot = Some(&field.name);
        }

        let names = (names.into_iter().enumerate())
            .map(|(value, name)| match name {
                Some(name) => Ok(name.to_owned()),
                None => Err(ConfigurationError::MissingDiscriminant {
                    struct_name: node.name.clone(),
                    value: value as u16,
                }),
            })
            .collect::<Result<_, _>>()?;

        Ok(UnionTag {
            offset: node.discriminant_offset * 2,
            names,
        })
    }

    /// Byte offset of the 16-bit tag in the data section.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Member names, indexed by discriminant.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name_of(&self, tag: u16) -> Option<&str> {
        self.names.get(usize::from(tag)).map(String::as_str)
    }

    pub fn discriminant_of(&self, member: &str) -> Option<u16> {
        let index = self.names.iter().position(|name| name == member)?;
        Some(index as u16)
    }
}

/// The constructor of one union member, like `new_square`.
#[derive(Clone, Debug)]
pub struct Factory {
    member: String,
    structor: Structor,
}

impl Factory {
    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn structor(&self) -> &Structor {
        &self.structor
    }
}

/// The constructors of a struct with a union.
#[derive(Clone, Debug)]
pub struct UnionConstructors {
    /// One factory per member, in declaration order.
    factories: Vec<Factory>,
    /// Non-union fields that the general constructor requires.
    mandatory: Vec<String>,
}

impl UnionConstructors {
    pub(crate) fn new(
        owner: &str,
        fields: &[Accessor],
        data_size: u16,
        ptrs_size: u16,
        tag: &UnionTag,
    ) -> UnionConstructors {
        let shared = || fields.iter().filter(|field| field.discriminant.is_none());

        let factories = (fields.iter())
            .filter_map(|member| Some((member, member.discriminant?)))
            .map(|(member, discriminant)| {
                let params = std::iter::once(member)
                    .chain(shared())
                    .cloned()
                    .map(Param::optional)
                    .collect();
                let tag = Tag {
                    offset: tag.offset(),
                    value: discriminant,
                };
                Factory {
                    member: member.name.clone(),
                    structor: Structor::new(owner, data_size, ptrs_size, params, Some(tag)),
                }
            })
            .collect();

        let mandatory = (shared())
            .filter(|field| field.default.is_none())
            .map(|field| field.name.clone())
            .collect();

        UnionConstructors {
            factories,
            mandatory,
        }
    }

    pub fn factories(&self) -> &[Factory] {
        &self.factories
    }

    pub fn factory(&self, member: &str) -> Option<&Factory> {
        self.factories.iter().find(|factory| factory.member == member)
    }

    /// Non-union fields that must be supplied to the general constructor.
    pub fn mandatory(&self) -> &[String] {
        &self.mandatory
    }

    /// The general constructor: exactly one member argument must be set.
    pub(crate) fn write(
        &self,
        module: &Module,
        builder: &mut Builder,
        region: Region,
        args: &Args,
    ) -> Result<(), ConstructError> {
        let mut supplied = (self.factories.iter()).filter(|factory| args.contains(&factory.member));

        let factory = match supplied.next() {
            Some(factory) => factory,
            None => {
                return Err(ConstructError::MissingUnionMember {
                    members: self.factories.iter().map(|f| f.member.clone()).collect(),
                });
            }
        };
        if let Some(other) = supplied.next() {
            return Err(ConstructError::ConflictingUnionMembers {
                first: factory.member.clone(),
                second: other.member.clone(),
            });
        }
        if let Some(field) = self.mandatory.iter().find(|field| !args.contains(field)) {
            return Err(ConstructError::MissingArgument {
                field: field.clone(),
            });
        }

        tracing::trace!(member = %factory.member, "dispatching union constructor");
        factory.structor.write(module, builder, region, args)
    }

    /// Write an unset group with a union: its first member, with defaults.
    pub(crate) fn write_defaults(
        &self,
        module: &Module,
        builder: &mut Builder,
        region: Region,
    ) -> Result<(), ConstructError> {
        let first = self.factories.iter().find(|factory| {
            (factory.structor.tag()).map_or(false, |tag| tag.value == 0)
        });
        match first {
            Some(factory) => factory.structor.write(module, builder, region, &Args::new()),
            None => Ok(()),
        }
    }
}
