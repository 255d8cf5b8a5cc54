//! Reading resolved types through the Type facade.

use std::rc::Rc;

use strata_core::Uri;
use strata_faults::FaultKind;
use strata_resolve::{Program, ResolveError, Type};

const DOC: &str = "memory://zoo.strata";

const ZOO: &str = "\
Animal
\tName
\tLegs
Dog : Animal
\tBark";

fn program_with(text: &str) -> Program {
    let program = Program::default();
    program
        .create_document(&Uri::parse(DOC).unwrap(), text)
        .unwrap();
    program
}

fn ty(program: &Program, path: &str) -> Rc<Type> {
    let uri = Uri::parse(&format!("{DOC}#{path}")).unwrap();
    program
        .construct(&uri)
        .unwrap()
        .unwrap_or_else(|| panic!("no type at {path}"))
}

fn names(types: &[Rc<Type>]) -> Vec<&str> {
    types.iter().map(|t| t.name()).collect()
}

fn uris(types: &[Rc<Type>]) -> Vec<String> {
    types.iter().map(|t| t.uri().to_string()).collect()
}

#[test]
fn bases_and_derivations() {
    let program = program_with(ZOO);
    let dog = ty(&program, "Dog");
    let animal = ty(&program, "Animal");

    assert_eq!(uris(&dog.bases().unwrap()), vec![format!("{DOC}#Animal")]);
    assert_eq!(uris(&animal.derivations().unwrap()), vec![format!("{DOC}#Dog")]);
    assert_eq!(names(&animal.subordinates().unwrap()), vec!["Dog"]);
    assert_eq!(names(&dog.superordinates().unwrap()), vec!["Animal"]);
    assert!(dog.is(&animal).unwrap());
    assert!(!animal.is(&dog).unwrap());
    assert_eq!(program.fault_count(), 0);
}

#[test]
fn construction_is_reference_stable() {
    let program = program_with(ZOO);
    let dog = ty(&program, "Dog");
    assert!(Rc::ptr_eq(&dog, &ty(&program, "Dog")));
    assert!(Rc::ptr_eq(&dog.bases().unwrap()[0], &ty(&program, "Animal")));

    let name = ty(&program, "Dog/Name");
    assert!(Rc::ptr_eq(name.container().unwrap(), &dog));
}

#[test]
fn types_go_dirty_after_an_edit() {
    let program = program_with(ZOO);
    let doc = program.documents()[0];
    let dog = ty(&program, "Dog");
    assert!(!dog.is_dirty());

    program
        .edit(doc, |facts| {
            facts.insert("Cat : Animal", 5);
        })
        .unwrap();

    assert!(dog.is_dirty());
    assert_eq!(
        dog.bases().unwrap_err(),
        ResolveError::Dirty {
            uri: format!("{DOC}#Dog")
        }
    );
    let fresh = ty(&program, "Dog");
    assert!(!Rc::ptr_eq(&dog, &fresh));
    assert_eq!(names(&fresh.bases().unwrap()), vec!["Animal"]);
    assert_eq!(
        names(&ty(&program, "Animal").derivations().unwrap()),
        vec!["Dog", "Cat"]
    );
}

#[test]
fn dropped_programs_are_reported() {
    let program = program_with(ZOO);
    let dog = ty(&program, "Dog");
    drop(program);
    assert!(dog.is_dirty());
    assert_eq!(dog.bases().unwrap_err(), ResolveError::ProgramDropped);
}

#[test]
fn contents_are_inherited_through_bases() {
    let program = program_with(ZOO);
    let dog = ty(&program, "Dog");
    assert_eq!(names(&dog.contents().unwrap()), vec!["Name", "Legs", "Bark"]);

    let name = ty(&program, "Dog/Name");
    assert!(!name.is_specified());
    assert!(name.is_override().unwrap());
    assert_eq!(uris(&name.parallels().unwrap()), vec![format!("{DOC}#Animal/Name")]);
    assert_eq!(
        uris(&name.parallel_roots().unwrap()),
        vec![format!("{DOC}#Animal/Name")]
    );

    let bark = ty(&program, "Dog/Bark");
    assert!(bark.is_specified());
    assert!(bark.is_fresh());
    assert!(bark.is_introduction().unwrap());
    assert!(dog.has(&bark).unwrap());
    assert!(dog.has(&name).unwrap());
}

#[test]
fn unspecified_types_union_their_bases() {
    let program = program_with("P1\n\tX : A, B\nP2\n\tX : B, C\nQ : P1, P2\nA\nB\nC");
    let x = ty(&program, "Q/X");
    assert!(!x.is_specified());
    assert_eq!(names(&x.bases().unwrap()), vec!["A", "B", "C"]);
}

#[test]
fn aliases_patterns_and_values() {
    let program = program_with("Number\n/[0-9]+/ : Number\nAge : 10");
    let number = ty(&program, "Number");
    let age = ty(&program, "Age");

    assert_eq!(age.values().unwrap(), vec!["10".to_string()]);
    assert_eq!(age.value().unwrap().as_deref(), Some("10"));
    assert!(age.is(&number).unwrap());

    let patterns = number.patterns().unwrap();
    assert_eq!(patterns.len(), 1);
    assert!(patterns[0].is_pattern());

    // The pattern derives from Number; Age reaches it only by alias.
    assert_eq!(uris(&number.derivations().unwrap()), uris(&patterns));
    assert!(patterns[0].derivations().unwrap().is_empty());
    assert!(number.values().unwrap().is_empty());
    assert_eq!(number.value().unwrap(), None);
}

#[test]
fn polymorphic_annotations_pick_the_nearest_existence() {
    let program = program_with("Name\nPerson\n\tName\n\tFull : Name");
    let full = ty(&program, "Person/Full");
    assert_eq!(
        uris(&full.bases().unwrap()),
        vec![format!("{DOC}#Person/Name")]
    );
}

#[test]
fn circular_bases_are_faulted_and_excluded() {
    let program = program_with("A : B\nB : A");
    assert_eq!(program.fault_count(), 2);
    assert!(program
        .faults()
        .iter()
        .all(|f| f.kind == FaultKind::CircularTypeReference));
    assert!(ty(&program, "A").bases().unwrap().is_empty());
    assert!(ty(&program, "B").bases().unwrap().is_empty());
}

#[test]
fn edges_leading_into_a_cycle_are_faulted_too() {
    let program = program_with("X : A\nA : B\nB : A");
    let faults: Vec<(FaultKind, u32)> = program
        .faults()
        .iter()
        .map(|f| (f.kind, f.line))
        .collect();
    assert_eq!(
        faults,
        vec![
            (FaultKind::CircularTypeReference, 0),
            (FaultKind::CircularTypeReference, 1),
            (FaultKind::CircularTypeReference, 2),
        ]
    );
    assert!(ty(&program, "X").bases().unwrap().is_empty());
}

#[test]
fn query_descends_through_contents() {
    let program = program_with("A\n\tB\n\t\tC");
    let a = ty(&program, "A");
    let c = a.query(&["B", "C"]).unwrap().unwrap();
    assert_eq!(c.uri().to_string(), format!("{DOC}#A/B/C"));
    assert!(a.query(&["B", "Z"]).unwrap().is_none());
    assert!(a.query::<&str>(&[]).unwrap().is_none());
}

#[test]
fn lists_expose_intrinsic_contents() {
    let program = program_with("Item\n\tWeight\nItems... : Item");
    let items = ty(&program, "Items...");
    assert!(items.is_list());
    assert_eq!(names(&items.contents_intrinsic().unwrap()), vec!["Weight"]);
    assert!(ty(&program, "Item")
        .contents_intrinsic()
        .unwrap()
        .is_empty());
}

#[test]
fn adjacents_are_siblings() {
    let program = program_with(ZOO);
    assert_eq!(names(&ty(&program, "Dog").adjacents().unwrap()), vec!["Animal"]);
    assert_eq!(
        names(&ty(&program, "Animal/Name").adjacents().unwrap()),
        vec!["Legs"]
    );
}

#[test]
fn traversal_order() {
    let program = program_with(ZOO);
    let dog = ty(&program, "Dog");
    assert_eq!(
        names(&dog.visit(|t| t.bases(), false).unwrap()),
        vec!["Dog", "Animal"]
    );
    assert_eq!(
        names(&dog.visit(|t| t.bases(), true).unwrap()),
        vec!["Animal", "Dog"]
    );

    let visits = dog.iterate(|t| t.bases(), false).unwrap();
    assert!(visits[0].via.is_none());
    assert_eq!(visits[1].via.as_ref().map(|t| t.name()), Some("Dog"));
}

#[test]
fn missing_addresses_construct_nothing() {
    let program = program_with(ZOO);
    let absent = Uri::parse(&format!("{DOC}#Nope")).unwrap();
    assert!(program.construct(&absent).unwrap().is_none());
    assert!(program.construct(&absent).unwrap().is_none());
    assert!(program
        .construct(&Uri::parse(DOC).unwrap())
        .unwrap()
        .is_none());
}

#[test]
fn roots_in_declaration_order() {
    let program = program_with(ZOO);
    let roots = program.construct_roots(program.documents()[0]).unwrap();
    assert_eq!(names(&roots), vec!["Animal", "Dog"]);
}
