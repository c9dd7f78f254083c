use kat::codecs::EnumCodec;
use kat::{
    data, decode, decode_data, decode_with, encode, encode_with, from_data_with, impl_encode,
    to_string, to_string_pretty, Assembler, BufferPool, Chain, Chan, Coder, Context, Data,
    DataMap, Error, Flow, Object, Options, Parser, PoolConfig, Registry, Result, Sketch, TypeDesc,
    Value,
};
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
struct User {
    id: i32,
    name: String,
}
impl_encode!(User);

fn user_sketch() -> Sketch<User> {
    Sketch::new("User", User::default)
        .field::<i32>("id", |u| &u.id, |u, v| u.id = v)
        .field::<String>("name", |u| &u.name, |u, v| u.name = v)
}

#[derive(Debug, Default, PartialEq)]
struct Story {
    id: i32,
    title: String,
    meta: DataMap,
    author: Option<User>,
}
impl_encode!(Story);

fn story_sketch() -> Sketch<Story> {
    Sketch::new("Story", Story::default)
        .field::<i32>("id", |s| &s.id, |s, v| s.id = v)
        .field::<String>("title", |s| &s.title, |s, v| s.title = v)
        .field::<DataMap>("meta", |s| &s.meta, |s, v| s.meta = v)
        .setter::<User>("author", |s, v| s.author = Some(v))
}

#[derive(Debug, PartialEq)]
struct Art {
    id: i64,
    tag: String,
    name: String,
}
impl_encode!(Art);

static ART_BUILT: AtomicUsize = AtomicUsize::new(0);

fn art_sketch() -> Sketch<Art> {
    Sketch::with_args("Art", |args| {
        ART_BUILT.fetch_add(1, Ordering::SeqCst);
        Ok(Art {
            id: args.required(0)?,
            tag: args.take(1)?.unwrap_or_default(),
            name: String::new(),
        })
    })
    .param::<i64>("id")
    .param::<String>("tag")
    .alias("meta")
    .field::<String>("name", |a| &a.name, |a, v| a.name = v)
    .getter::<i64>("id", |a| &a.id)
    .getter::<String>("meta", |a| &a.tag)
}

#[derive(Debug, PartialEq)]
struct Post {
    id: i64,
    tags: Vec<String>,
}

fn post_sketch() -> Sketch<Post> {
    Sketch::with_args("Post", |args| {
        Ok(Post {
            id: args.required(0)?,
            tags: Vec::new(),
        })
    })
    .param::<i64>("id")
    .setter::<String>("tag", |p, v| p.tags.push(v))
}

#[derive(Debug, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

fn point_sketch() -> Sketch<Point> {
    Sketch::with_args("Point", |args| {
        let x: i32 = args.required(0)?;
        let y: i32 = args.required(1)?;
        if x < 0 {
            return Err(Error::custom("x must not be negative"));
        }
        Ok(Point { x, y })
    })
    .param::<i32>("x")
    .param::<i32>("y")
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum Role {
    #[default]
    Guest,
    Admin,
}
impl_encode!(Role);

#[derive(Debug, Default, PartialEq)]
struct Member {
    role: Role,
}
impl_encode!(Member);

fn registry() -> Registry {
    let registry = Registry::layered(Registry::global().clone());
    registry.register_sketch(user_sketch());
    registry.register_sketch(story_sketch());
    registry.register_sketch(art_sketch());
    registry.register_sketch(post_sketch());
    registry.register_sketch(point_sketch());
    registry.register::<Role>(Arc::new(EnumCodec::new(
        "Role",
        vec![("Guest", Role::Guest), ("Admin", Role::Admin)],
    )));
    registry.register_sketch(
        Sketch::new("Member", Member::default)
            .field::<Role>("role", |m| &m.role, |m, v| m.role = v),
    );
    registry
}

fn decode_as<T: Any>(registry: &Registry, text: &str) -> Result<Option<T>> {
    let obj = decode_with(text, registry, &Options::new(), Some(TypeDesc::of::<T>()))?;
    Ok(obj.and_then(|o| o.downcast::<T>().ok()).map(|t| *t))
}

#[test]
fn test_user_through_sketch_and_serde() {
    let registry = registry();
    let user = User {
        id: 1,
        name: "kraity".to_string(),
    };

    let mapped = encode_with(&user, &registry, Options::new()).unwrap();
    assert_eq!(mapped, "User{i:id(1)s:name(kraity)}");
    assert_eq!(to_string(&user).unwrap(), mapped);

    let decoded: User = decode_as(&registry, &mapped).unwrap().unwrap();
    assert_eq!(decoded, user);
}

#[test]
fn test_story_written_through_chan() {
    let registry = registry();
    let author = User {
        id: 1,
        name: "kraity".to_string(),
    };

    let mut chan = Chan::new(&registry, Options::new());
    chan.set_entry(None, Some("Story"), |chan| {
        chan.set(Some("id"), &100001)?;
        chan.set(Some("title"), &"KAT+".to_string())?;
        chan.set_entry(Some("meta"), None, |chan| {
            chan.set(Some("view"), &99)?;
            Ok(())
        })?;
        chan.set(Some("author"), &author)?;
        Ok(())
    })
    .unwrap();
    let text = chan.finish().unwrap();
    assert_eq!(
        text,
        "Story{i:id(100001)s:title(KAT+)M:meta{i:view(99)}User:author{i:id(1)s:name(kraity)}}"
    );

    let story: Story = decode_as(&registry, &text).unwrap().unwrap();
    assert_eq!(story.id, 100001);
    assert_eq!(story.title, "KAT+");
    assert_eq!(story.meta.get("view"), Some(&Data::Int(99)));
    assert_eq!(story.author, Some(author));
}

#[test]
fn test_constructor_runs_once_with_members_in_any_order() {
    let registry = registry();
    let before = ART_BUILT.load(Ordering::SeqCst);

    let art: Art = decode_as(&registry, "Art{s:name(kraity)l:id(1)s:meta(katplus)}")
        .unwrap()
        .unwrap();
    assert_eq!(
        art,
        Art {
            id: 1,
            tag: "katplus".into(),
            name: "kraity".into()
        }
    );
    assert_eq!(ART_BUILT.load(Ordering::SeqCst) - before, 1);
}

#[test]
fn test_early_fields_applied_in_arrival_order() {
    let registry = registry();
    let post: Post = decode_as(&registry, "Post{s:tag(a)s:tag(b)l:id(5)s:tag(c)}")
        .unwrap()
        .unwrap();
    assert_eq!(post.id, 5);
    assert_eq!(post.tags, vec!["a", "b", "c"]);
}

#[test]
fn test_missing_primitive_argument_is_zero() {
    let registry = registry();
    let point: Point = decode_as(&registry, "Point{i:x(3)}").unwrap().unwrap();
    assert_eq!(point, Point { x: 3, y: 0 });

    let point: Point = decode_as(&registry, "Point{}").unwrap().unwrap();
    assert_eq!(point, Point { x: 0, y: 0 });
}

#[test]
fn test_constructor_rejection_is_construction_error() {
    let registry = registry();
    let err = decode_as::<Point>(&registry, "Point{i:x(-1)i:y(2)}").unwrap_err();
    assert!(err.is_construction(), "{err}");
    assert!(err.to_string().contains("negative"));
}

#[test]
fn test_unknown_members_are_skipped() {
    let registry = registry();
    let text = "User{i:id(1)s:nick(x)M:extra{i:a(1)L:b{i(1)}Nope:c{}}s:name(kraity)}";
    let user: User = decode_as(&registry, text).unwrap().unwrap();
    assert_eq!(
        user,
        User {
            id: 1,
            name: "kraity".into()
        }
    );
}

#[test]
fn test_pretty_output_decodes_like_compact() {
    #[derive(Serialize)]
    struct Story {
        id: i32,
        meta: BTreeMap<String, i32>,
    }

    let story = Story {
        id: 1,
        meta: BTreeMap::from([("view".to_string(), 99)]),
    };
    let pretty = to_string_pretty(&story).unwrap();
    assert_eq!(pretty, "Story{\n  i:id(1)\n  M:meta{\n    i:view(99)\n  }\n}");

    let compact = to_string(&story).unwrap();
    assert_eq!(compact, "Story{i:id(1)M:meta{i:view(99)}}");
    assert_eq!(decode_data(&pretty).unwrap(), decode_data(&compact).unwrap());
}

#[test]
fn test_layered_registry_wins_over_parent() {
    struct Doubling;

    impl Coder for Doubling {
        fn space(&self) -> &str {
            "i"
        }

        fn accepts(&self, desc: &TypeDesc) -> bool {
            desc.is::<i32>()
        }

        fn read(&self, _ctx: &Context<'_>, value: &Value) -> Result<Option<Object>> {
            Ok(value.to_i32().map(|v| Box::new(v * 2) as Object))
        }
    }

    let base = Arc::new(registry());
    let layer = Registry::layered(base.clone());
    layer.register::<i32>(Arc::new(Doubling));

    let text = "User{i:id(4)s:name(k)}";
    let plain: User = decode_as(&base, text).unwrap().unwrap();
    let doubled: User = decode_as(&layer, text).unwrap().unwrap();
    assert_eq!(plain.id, 4);
    assert_eq!(doubled.id, 8);
}

#[test]
fn test_first_codec_keeps_its_tag() {
    let registry = Registry::with_defaults();
    let coder = registry.by_space("i").unwrap();
    assert!(coder.accepts(&TypeDesc::of::<i32>()));
    assert!(!coder.accepts(&TypeDesc::of::<u8>()));
    assert_eq!(decode_data("i(300)").unwrap(), Data::Int(300));
}

#[test]
fn test_enum_by_name_and_ordinal() {
    let registry = registry();
    let admin = Member { role: Role::Admin };

    assert_eq!(
        encode_with(&admin, &registry, Options::new()).unwrap(),
        "Member{Role:role(Admin)}"
    );
    assert_eq!(
        encode_with(&admin, &registry, Options::new().with_enum_as_index(true)).unwrap(),
        "Member{Role:role(1)}"
    );

    for text in ["Member{Role:role(Admin)}", "Member{Role:role(1)}"] {
        let member: Member = decode_as(&registry, text).unwrap().unwrap();
        assert_eq!(member, admin, "{text}");
    }
    let member: Member = decode_as(&registry, "Member{Role:role(Owner)}").unwrap().unwrap();
    assert_eq!(member.role, Role::Guest);
}

#[test]
fn test_object_tag_guesses_scalars() {
    let data = decode_data("M{$:a(true)$:b(12)$:c(5000000000)$:d(1.5)$:e(hello)$:f(1.2.3)$:g()}")
        .unwrap();
    assert_eq!(data.get("a"), Some(&Data::Bool(true)));
    assert_eq!(data.get("b"), Some(&Data::Int(12)));
    assert_eq!(data.get("c"), Some(&Data::Int(5_000_000_000)));
    assert_eq!(data.get("d"), Some(&Data::Float(1.5)));
    assert_eq!(data.get("e"), Some(&Data::Text("hello".into())));
    assert_eq!(data.get("f"), Some(&Data::Text("1.2.3".into())));
    assert_eq!(data.get("g"), Some(&Data::Null));

    assert_eq!(decode_data("$(123)").unwrap(), Data::Int(123));
    assert_eq!(decode_data("$(0xFF)").unwrap(), Data::Int(255));
    assert_eq!(decode_data("$(True)").unwrap(), Data::Bool(true));
    assert_eq!(decode_data("$(TRue)").unwrap(), Data::Text("TRue".into()));
    assert_eq!(
        decode_data("$(123.456AA)").unwrap(),
        Data::Text("123.456AA".into())
    );
}

#[test]
fn test_data_matches_serde_json() {
    let data = decode_data("M{i:id(1)s:name(kraity)L:tags{s(a)s(b)}b:draft(false)$:note()}").unwrap();
    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "id": 1,
            "name": "kraity",
            "tags": ["a", "b"],
            "draft": false,
            "note": null
        })
    );

    let back: Data = serde_json::from_value(json).unwrap();
    assert_eq!(back, data);
    assert_eq!(
        back,
        data!({ "id": 1, "name": "kraity", "tags": ["a", "b"], "draft": false, "note": null })
    );
}

#[test]
fn test_pool_limit_refuses_large_tokens() {
    let pool: &'static BufferPool = Box::leak(Box::new(
        BufferPool::new(PoolConfig {
            size: 1,
            limit: 1,
            scale: 64,
            depth: 1,
        })
        .unwrap(),
    ));
    let registry = registry();

    let flow = Flow::with_chain(Chain::with_pool(pool), Options::new());
    let mut chan = Chan::with_flow(&registry, flow);
    let err = chan.set(None, &"x".repeat(200)).unwrap_err();
    assert!(err.is_resource_limit(), "{err}");

    let input = format!("s({})", "y".repeat(200));
    let options = Options::new();
    let mut assembler = Assembler::new(Context::new(&registry, &options), None);
    let err = Parser::with_pool(input.as_bytes(), pool)
        .parse(&mut assembler)
        .unwrap_err();
    assert!(matches!(err, Error::ResourceLimit { limit: 64, .. }), "{err}");

    // small tokens still fit
    let mut assembler = Assembler::new(Context::new(&registry, &options), None);
    Parser::with_pool(b"s(ok)", pool).parse(&mut assembler).unwrap();
    let obj = assembler.finish().unwrap().unwrap();
    assert_eq!(*obj.downcast::<String>().unwrap(), "ok");
}

#[test]
fn test_syntax_errors_report_position() {
    let err = decode_data("M{\n  i:a(1)\n  s:b(x}").unwrap_err();
    match err {
        Error::Syntax { line, .. } => assert_eq!(line, 3),
        other => panic!("expected a syntax error, got {other}"),
    }
}

#[test]
fn test_data_converts_into_sketch_types() {
    let registry = registry();
    let data = data!({
        "id": 7,
        "title": "KAT+",
        "meta": { "view": 99 },
        "author": { "id": 1, "name": "kraity" },
        "unknown": [1, 2]
    });
    let story: Story = from_data_with(&data, &registry).unwrap().unwrap();
    assert_eq!(story.id, 7);
    assert_eq!(story.title, "KAT+");
    assert_eq!(story.meta.get("view"), Some(&Data::Int(99)));
    assert_eq!(
        story.author,
        Some(User {
            id: 1,
            name: "kraity".into()
        })
    );

    let point: Point = from_data_with(&data!({ "y": 4, "x": 3 }), &registry).unwrap().unwrap();
    assert_eq!(point, Point { x: 3, y: 4 });

    let err = from_data_with::<Point>(&data!({ "x": (-1) }), &registry).unwrap_err();
    assert!(err.is_construction(), "{err}");

    assert_eq!(from_data_with::<User>(&Data::Null, &registry).unwrap(), None);
    assert_eq!(from_data_with::<i32>(&Data::Int(5), &registry).unwrap(), Some(5));
}

#[test]
fn test_data_conversion_matches_text_decode() {
    let registry = registry();
    let text = "Point{i:y(2)i:x(1)}";
    let from_text: Point = decode_as(&registry, text).unwrap().unwrap();
    let data = decode_data(text).unwrap();
    let from_tree: Point = from_data_with(&data, &registry).unwrap().unwrap();
    assert_eq!(from_tree, from_text);
}

#[test]
fn test_large_value_roundtrip() {
    let text: String = "kat(+)^".chars().cycle().take(9000).collect();
    let encoded = encode(&text).unwrap();
    assert!(encoded.len() > 9000);
    assert_eq!(decode::<String>(&encoded).unwrap(), Some(text));

    let plain = "k".repeat(9000);
    let encoded = encode(&plain).unwrap();
    assert_eq!(encoded.len(), plain.len() + 3);
    assert_eq!(decode::<String>(&encoded).unwrap(), Some(plain));
}

#[test]
fn test_value_just_below_pool_limit() {
    let pool: &'static BufferPool = Box::leak(Box::new(
        BufferPool::new(PoolConfig {
            size: 2,
            limit: 4,
            scale: 1024,
            depth: 1,
        })
        .unwrap(),
    ));
    let registry = registry();
    let fits = "x".repeat(4096 - 4);

    let flow = Flow::with_chain(Chain::with_pool(pool), Options::new());
    let mut chan = Chan::with_flow(&registry, flow);
    chan.set(None, &fits).unwrap();
    assert_eq!(chan.finish().unwrap().len(), 4096 - 1);

    let flow = Flow::with_chain(Chain::with_pool(pool), Options::new());
    let mut chan = Chan::with_flow(&registry, flow);
    let err = chan.set(None, &"x".repeat(4096)).unwrap_err();
    assert!(err.is_resource_limit(), "{err}");
}

#[test]
fn test_parallel_encode_and_decode() {
    let registry = registry();
    std::thread::scope(|scope| {
        for worker in 0..8 {
            let registry = &registry;
            scope.spawn(move || {
                for i in 0..200 {
                    let user = User {
                        id: worker * 1000 + i,
                        name: format!("user ({worker}) ^{i}"),
                    };
                    let text = encode_with(&user, registry, Options::new()).unwrap();
                    let back: User = decode_as(registry, &text).unwrap().unwrap();
                    assert_eq!(back, user);

                    let data = decode_data(&to_string(&user).unwrap()).unwrap();
                    assert_eq!(data.get("id"), Some(&Data::Int(i64::from(user.id))));
                }
            });
        }
    });
}
