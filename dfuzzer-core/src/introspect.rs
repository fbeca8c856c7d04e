//! §4.3 Introspector: fetch and parse the standard `Introspect` reply into
//! the methods and child nodes at one object path.

use std::io::BufReader;

use dfuzzer_value::{signature::parse_arguments, TypeSignature};
use xml::reader::{EventReader, XmlEvent};

use crate::error::{Error, Result};

/// The seam `Introspector` needs from the bus client; lets `Traversal`'s
/// tests substitute a fake XML responder instead of a real bus connection.
pub trait Introspectable {
    fn introspect_xml(&self, destination: &str, object_path: &str) -> Result<String>;
}

/// §3 `MethodDescriptor`: `returns_value` is false iff the method carries a
/// `org.freedesktop.DBus.Method.NoReply` annotation with value `"true"`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    pub name: String,
    pub signature: TypeSignature,
    pub returns_value: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NodeDescriptor {
    pub interfaces: Vec<InterfaceDescriptor>,
    pub children: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub methods: Vec<MethodDescriptor>,
}

pub struct Introspector<'b, I: Introspectable> {
    bus: &'b I,
}

impl<'b, I: Introspectable> Introspector<'b, I> {
    pub fn new(bus: &'b I) -> Self {
        Self { bus }
    }

    /// A parse or bus failure here only ever affects this one node (original
    /// spec §4.3) — the caller decides what `Verdict::Error` means for the
    /// surrounding traversal.
    pub fn introspect(&self, destination: &str, object_path: &str) -> Result<NodeDescriptor> {
        let xml = self.bus.introspect_xml(destination, object_path)?;
        parse_introspection_xml(&xml)
    }
}

fn parse_introspection_xml(xml: &str) -> Result<NodeDescriptor> {
    let reader = EventReader::new(BufReader::new(xml.as_bytes()));

    let mut node = NodeDescriptor::default();
    let mut current_interface: Option<InterfaceDescriptor> = None;
    let mut current_method: Option<(String, Vec<String>, bool)> = None;

    for event in reader {
        let event = event.map_err(|e| Error::Introspection(e.to_string()))?;
        match event {
            XmlEvent::StartElement { name, attributes, .. } => match name.local_name.as_str() {
                "node" => {
                    if let Some(node_name) = attributes.iter().find(|a| a.name.local_name == "name") {
                        if !node_name.value.is_empty() {
                            node.children.push(node_name.value.clone());
                        }
                    }
                }
                "interface" => {
                    let iface_name = attributes
                        .iter()
                        .find(|a| a.name.local_name == "name")
                        .map(|a| a.value.clone())
                        .ok_or_else(|| Error::Introspection("<interface> missing name".to_string()))?;
                    current_interface = Some(InterfaceDescriptor {
                        name: iface_name,
                        methods: Vec::new(),
                    });
                }
                "method" => {
                    let method_name = attributes
                        .iter()
                        .find(|a| a.name.local_name == "name")
                        .map(|a| a.value.clone())
                        .ok_or_else(|| Error::Introspection("<method> missing name".to_string()))?;
                    current_method = Some((method_name, Vec::new(), true));
                }
                "arg" => {
                    if let Some((_, arg_codes, _)) = current_method.as_mut() {
                        let direction = attributes
                            .iter()
                            .find(|a| a.name.local_name == "direction")
                            .map(|a| a.value.as_str())
                            .unwrap_or("in");
                        if direction == "in" {
                            if let Some(ty) = attributes.iter().find(|a| a.name.local_name == "type") {
                                arg_codes.push(ty.value.clone());
                            }
                        }
                    }
                }
                "annotation" => {
                    if let Some((_, _, returns_value)) = current_method.as_mut() {
                        let annotation_name = attributes
                            .iter()
                            .find(|a| a.name.local_name == "name")
                            .map(|a| a.value.as_str());
                        let annotation_value = attributes
                            .iter()
                            .find(|a| a.name.local_name == "value")
                            .map(|a| a.value.as_str());
                        if annotation_name == Some("org.freedesktop.DBus.Method.NoReply")
                            && annotation_value == Some("true")
                        {
                            *returns_value = false;
                        }
                    }
                }
                _ => {}
            },
            XmlEvent::EndElement { name } => match name.local_name.as_str() {
                "method" => {
                    if let Some((method_name, arg_codes, returns_value)) = current_method.take() {
                        let joined = format!("({})", arg_codes.join(""));
                        let signature = parse_arguments(&joined)
                            .map_err(|e| Error::Introspection(format!("method {method_name}: {e}")))?;
                        if let Some(iface) = current_interface.as_mut() {
                            iface.methods.push(MethodDescriptor {
                                name: method_name,
                                signature,
                                returns_value,
                            });
                        }
                    }
                }
                "interface" => {
                    if let Some(iface) = current_interface.take() {
                        node.interfaces.push(iface);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    Ok(node)
}
