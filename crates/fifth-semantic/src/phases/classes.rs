//! Class shape normalization: default constructors and backing fields

use super::builder_for;
use fifth_ast::*;
use std::rc::Rc;

/// Give every class without a parameterless constructor an empty one
pub(super) fn insert_constructors(ast: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
    let mut b = builder_for(ast);
    let mut changed = false;
    let modules: Vec<_> = ast
        .modules
        .iter()
        .map(|module| {
            if module.classes.iter().all(|c| c.default_constructor().is_some()) {
                return module.clone();
            }
            changed = true;
            let classes = module
                .classes
                .iter()
                .map(|class| {
                    if class.default_constructor().is_some() {
                        return class.clone();
                    }
                    tracing::trace!(class = %class.name, "inserting default constructor");
                    b.set_location(class.location().cloned());
                    let body = b.block(vec![]);
                    let ctor = b.callable(&class.name, vec![], "void", body, FunctionKind::Constructor);
                    let mut methods = vec![ctor];
                    methods.extend(class.methods.iter().cloned());
                    class.with_methods(methods)
                })
                .collect();
            module.with_classes(classes)
        })
        .collect();

    if changed {
        ast.with_modules(modules)
    } else {
        ast.clone()
    }
}

/// Turn properties into fields of the same name and type
pub(super) fn properties_to_fields(ast: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
    if ast.classes().all(|c| c.properties.is_empty()) {
        return ast.clone();
    }
    let modules = ast
        .modules
        .iter()
        .map(|module| {
            if module.classes.iter().all(|c| c.properties.is_empty()) {
                return module.clone();
            }
            let classes = module
                .classes
                .iter()
                .map(|class| {
                    if class.properties.is_empty() {
                        return class.clone();
                    }
                    let mut fields = class.fields.clone();
                    fields.extend(class.properties.iter().map(|property| {
                        Rc::new(FieldDef {
                            meta: property.meta.clone(),
                            name: property.name.clone(),
                            type_name: property.type_name.clone(),
                        })
                    }));
                    class.with_members(fields, Vec::new())
                })
                .collect();
            module.with_classes(classes)
        })
        .collect();
    ast.with_modules(modules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(b: &mut AstBuilder, methods: Vec<Rc<FunctionDef>>) -> Rc<AssemblyDef> {
        let age = b.field("age", "int");
        let name = b.property("name", "string");
        let class = b.class("Person", vec![age], vec![name], methods);
        let module = b.module("main", vec![class], vec![]);
        b.assembly("program", vec![module])
    }

    #[test]
    fn test_constructor_is_inserted_once() {
        let mut b = AstBuilder::new();
        let program = person(&mut b, vec![]);
        let lowered = insert_constructors(&program);
        let class = lowered.classes().next().unwrap();
        let ctor = class.default_constructor().unwrap();
        assert_eq!(ctor.name, "Person");
        assert!(ctor.body.statements.is_empty());
        assert!(ctor.id() > visit::max_node_id(&program));

        let again = insert_constructors(&lowered);
        assert!(Rc::ptr_eq(&again, &lowered));
    }

    #[test]
    fn test_properties_become_fields() {
        let mut b = AstBuilder::new();
        let program = person(&mut b, vec![]);
        let lowered = properties_to_fields(&program);
        let class = lowered.classes().next().unwrap();
        assert!(class.properties.is_empty());
        let names: Vec<_> = class.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["age", "name"]);
        assert_eq!(class.member_type("name"), Some("string"));
        // The property's identity carries over
        let original = program.classes().next().unwrap();
        assert_eq!(class.fields[1].id(), original.properties[0].id());
    }
}
