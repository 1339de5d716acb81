//! Invalidation tags and expiry annotations.
//!
//! Every cached fragment carries the tags of the entities it was built from
//! plus the earliest moment any of them stops being visible. Changing an
//! entity invalidates all fragments tagged with it.

use std::collections::BTreeSet;
use std::fmt;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::products::{PRODUCT_DOMAIN, ProductRecord};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(String);

impl Tag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Tag covering every entity of a domain.
    pub fn category(domain: &str) -> Self {
        Self(domain.to_string())
    }

    /// Tag of one entity, e.g. `product-<uuid>`.
    pub fn entity(domain: &str, id: Uuid) -> Self {
        Self(format!("{domain}-{id}"))
    }

    pub fn product(id: Uuid) -> Self {
        Self::entity(PRODUCT_DOMAIN, id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Link from a taggable item to another one, with the link's own expiry.
pub struct Linked<'a> {
    pub expires_at: Option<OffsetDateTime>,
    pub item: &'a dyn Taggable,
}

/// Something a fragment can depend on.
pub trait Taggable {
    fn tag_domain(&self) -> &str;
    fn tag_id(&self) -> Uuid;
    fn expires_at(&self) -> Option<OffsetDateTime>;

    fn linked(&self) -> Vec<Linked<'_>> {
        Vec::new()
    }

    fn tag(&self) -> Tag {
        Tag::entity(self.tag_domain(), self.tag_id())
    }
}

impl Taggable for ProductRecord {
    fn tag_domain(&self) -> &str {
        PRODUCT_DOMAIN
    }

    fn tag_id(&self) -> Uuid {
        self.id
    }

    fn expires_at(&self) -> Option<OffsetDateTime> {
        self.end_at
    }

    fn linked(&self) -> Vec<Linked<'_>> {
        self.references
            .iter()
            .map(|reference| Linked {
                expires_at: reference.end_at,
                item: &reference.product as &dyn Taggable,
            })
            .collect()
    }
}

/// Tags and earliest expiry collected while building one fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    tags: BTreeSet<Tag>,
    expires_at: Option<OffsetDateTime>,
}

impl Annotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at
    }

    pub fn add_tag(&mut self, tag: Tag) {
        self.tags.insert(tag);
    }

    /// Lower the expiry to `candidate` if that is earlier. `None` never raises it.
    pub fn expire_no_later_than(&mut self, candidate: Option<OffsetDateTime>) {
        self.expires_at = match (self.expires_at, candidate) {
            (Some(current), Some(next)) => Some(current.min(next)),
            (current, None) => current,
            (None, next) => next,
        };
    }

    pub fn merge(&mut self, other: &Annotation) {
        self.tags.extend(other.tags.iter().cloned());
        self.expire_no_later_than(other.expires_at);
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.expires_at.is_none()
    }
}

/// How finely fragments are tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
    /// One tag per entity and per linked entity.
    PerEntity,
    /// Only the domain tag of each entity.
    Aggregate,
}

#[derive(Debug, Clone, Copy)]
pub struct TagAnnotator {
    mode: TagMode,
}

impl TagAnnotator {
    pub fn new(mode: TagMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> TagMode {
        self.mode
    }

    /// Add tags and expiries for `entities` and the explicit `categories`.
    ///
    /// Expiries are always folded in, including those of links and linked
    /// items, whatever the tag mode.
    pub fn annotate<'a, I, T>(&self, annotation: &mut Annotation, entities: I, categories: &[&str])
    where
        I: IntoIterator<Item = &'a T>,
        T: Taggable + 'a,
    {
        for category in categories {
            annotation.add_tag(Tag::category(category));
        }

        for entity in entities {
            self.annotate_one(annotation, entity);
        }
    }

    fn annotate_one(&self, annotation: &mut Annotation, entity: &dyn Taggable) {
        match self.mode {
            TagMode::PerEntity => annotation.add_tag(entity.tag()),
            TagMode::Aggregate => annotation.add_tag(Tag::category(entity.tag_domain())),
        }
        annotation.expire_no_later_than(entity.expires_at());

        for linked in entity.linked() {
            if self.mode == TagMode::PerEntity {
                annotation.add_tag(linked.item.tag());
            }
            annotation.expire_no_later_than(linked.expires_at);
            annotation.expire_no_later_than(linked.item.expires_at());
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::products::{ProductKind, ProductReference};

    fn product(code: &str) -> ProductRecord {
        ProductRecord::new(Uuid::new_v4(), code, ProductKind::Default)
    }

    #[test]
    fn per_entity_mode_tags_items_and_references() {
        let variant = product("shirt-s");
        let shirt = ProductRecord::new(Uuid::new_v4(), "shirt", ProductKind::Select)
            .with_reference(ProductReference::variant(variant.clone()));

        let mut annotation = Annotation::new();
        TagAnnotator::new(TagMode::PerEntity).annotate(&mut annotation, [&shirt], &["product"]);

        let tags: Vec<_> = annotation.tags().iter().map(Tag::as_str).collect();
        assert_eq!(tags.len(), 3);
        assert!(annotation.tags().contains(&Tag::product(shirt.id)));
        assert!(annotation.tags().contains(&Tag::product(variant.id)));
        assert!(annotation.tags().contains(&Tag::category("product")));
    }

    #[test]
    fn aggregate_mode_only_tags_domains() {
        let shirt = product("shirt").with_reference(ProductReference::variant(product("s")));

        let mut annotation = Annotation::new();
        TagAnnotator::new(TagMode::Aggregate).annotate(&mut annotation, [&shirt], &[]);

        assert_eq!(
            annotation.tags().iter().collect::<Vec<_>>(),
            vec![&Tag::category("product")]
        );
    }

    #[test]
    fn expiry_is_earliest_of_items_links_and_linked_items() {
        let mut link = ProductReference::variant(
            product("s").with_end_at(datetime!(2031-01-01 00:00 UTC)),
        );
        link.end_at = Some(datetime!(2030-06-01 00:00 UTC));
        let shirt = product("shirt")
            .with_end_at(datetime!(2032-01-01 00:00 UTC))
            .with_reference(link);
        let socks = product("socks");

        let mut annotation = Annotation::new();
        TagAnnotator::new(TagMode::Aggregate).annotate(
            &mut annotation,
            [&shirt, &socks],
            &["product"],
        );

        assert_eq!(annotation.expires_at(), Some(datetime!(2030-06-01 00:00 UTC)));
    }

    #[test]
    fn no_expiry_when_nothing_ends() {
        let mut annotation = Annotation::new();
        TagAnnotator::new(TagMode::PerEntity).annotate(&mut annotation, [&product("a")], &[]);
        assert!(annotation.expires_at().is_none());
    }

    #[test]
    fn merge_unions_tags_and_keeps_minimum() {
        let mut left = Annotation::new();
        left.add_tag(Tag::new("a"));
        left.expire_no_later_than(Some(datetime!(2030-01-01 00:00 UTC)));

        let mut right = Annotation::new();
        right.add_tag(Tag::new("b"));
        right.expire_no_later_than(Some(datetime!(2029-01-01 00:00 UTC)));

        left.merge(&right);
        assert_eq!(left.tags().len(), 2);
        assert_eq!(left.expires_at(), Some(datetime!(2029-01-01 00:00 UTC)));
    }
}
